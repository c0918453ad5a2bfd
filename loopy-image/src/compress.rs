//! Turning an intermediate raster into the final tile file.
//!
//! Every group is first written to `<name>.tif_`. Only a successfully
//! compressed result is renamed to `<name>.tif`; on failure the intermediate
//! stays on disk for inspection.

use std::path::{Path, PathBuf};
use std::process::Command;

use loopy_core::{LoopyError, Result};
use loopy_io::Dtype;

use crate::config::Compressor;

/// Intermediate path of `final_path`: the same name with a trailing `_`.
pub fn intermediate_path(final_path: &Path) -> PathBuf {
    let mut s = final_path.as_os_str().to_owned();
    s.push("_");
    PathBuf::from(s)
}

fn rename(from: &Path, to: &Path) -> Result<()> {
    std::fs::rename(from, to).map_err(|e| LoopyError::io_at(from, e))
}

/// `gdal_translate` creation options for a group of `dtype` samples.
pub fn gdal_args(dtype: Dtype, quality: u8) -> Vec<String> {
    let mut args: Vec<String> = ["-of", "GTiff", "-co", "TILED=YES", "-co", "COPY_SRC_OVERVIEWS=YES"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    match dtype {
        Dtype::Uint8 => args.extend([
            "-co".to_string(),
            "COMPRESS=JPEG".to_string(),
            "-co".to_string(),
            format!("JPEG_QUALITY={quality}"),
        ]),
        Dtype::Uint16 => args.extend(["-co".to_string(), "COMPRESS=DEFLATE".to_string()]),
    }
    args
}

/// Produce `final_path` from its intermediate with `compressor`.
pub fn finalize(
    compressor: &Compressor,
    final_path: &Path,
    dtype: Dtype,
    quality: u8,
) -> Result<()> {
    let intermediate = intermediate_path(final_path);
    match compressor {
        Compressor::Inline => rename(&intermediate, final_path),
        Compressor::Gdal { program } => {
            let mut partial = final_path.as_os_str().to_owned();
            partial.push(".partial");
            let partial = PathBuf::from(partial);

            let mut cmd = Command::new(program);
            cmd.arg(&intermediate).arg(&partial).args(gdal_args(dtype, quality));
            let described = format!("{cmd:?}");
            log::debug!("running {described}");

            let output = cmd.output().map_err(|e| LoopyError::Subprocess {
                command: described.clone(),
                stderr: e.to_string(),
            })?;
            if !output.status.success() {
                let _ = std::fs::remove_file(&partial);
                return Err(LoopyError::Subprocess {
                    command: described,
                    stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                });
            }

            rename(&partial, final_path)?;
            std::fs::remove_file(&intermediate).map_err(|e| LoopyError::io_at(&intermediate, e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intermediate_path() {
        assert_eq!(
            intermediate_path(Path::new("/out/img_1.tif")),
            PathBuf::from("/out/img_1.tif_")
        );
    }

    #[test]
    fn test_gdal_args_by_dtype() {
        let jpeg = gdal_args(Dtype::Uint8, 95).join(" ");
        assert!(jpeg.contains("COMPRESS=JPEG"));
        assert!(jpeg.contains("JPEG_QUALITY=95"));
        assert!(jpeg.contains("COPY_SRC_OVERVIEWS=YES"));

        let deflate = gdal_args(Dtype::Uint16, 95).join(" ");
        assert!(deflate.contains("COMPRESS=DEFLATE"));
        assert!(!deflate.contains("JPEG"));
    }

    #[test]
    fn test_inline_renames() {
        let dir = tempfile::tempdir().unwrap();
        let final_path = dir.path().join("img.tif");
        std::fs::write(intermediate_path(&final_path), b"tiles").unwrap();
        finalize(&Compressor::Inline, &final_path, Dtype::Uint8, 90).unwrap();
        assert_eq!(std::fs::read(&final_path).unwrap(), b"tiles");
        assert!(!intermediate_path(&final_path).exists());
    }

    #[test]
    fn test_failed_subprocess_keeps_intermediate() {
        let dir = tempfile::tempdir().unwrap();
        let final_path = dir.path().join("img.tif");
        std::fs::write(intermediate_path(&final_path), b"tiles").unwrap();
        let compressor = Compressor::Gdal {
            program: dir.path().join("no-such-gdal_translate"),
        };
        let err = finalize(&compressor, &final_path, Dtype::Uint8, 90).unwrap_err();
        assert!(matches!(err, LoopyError::Subprocess { .. }));
        assert!(err.to_string().contains("no-such-gdal_translate"));
        assert!(intermediate_path(&final_path).exists());
        assert!(!final_path.exists());
    }
}
