use crate::error::PairError;
use image::RgbaImage;
use log::debug;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Decode a screenshot into an RGBA grid.
pub fn load_grid<P: AsRef<Path>>(path: P) -> Result<RgbaImage, PairError> {
    let path = path.as_ref();
    let img = image::open(path).map_err(|source| PairError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(img.to_rgba8())
}

/// Replace whatever is at `path` with the encoded grid.
///
/// Any existing file is deleted first; the format follows the extension.
pub fn write_overlay<P: AsRef<Path>>(path: P, grid: &RgbaImage) -> Result<(), PairError> {
    let path = path.as_ref();
    match fs::remove_file(path) {
        Ok(()) => debug!("Removed previous overlay {}", path.display()),
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(source) => {
            return Err(PairError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    }

    grid.save(path).map_err(|source| PairError::Encode {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_png_round_trip_is_lossless() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.png");
        let mut grid = RgbaImage::from_pixel(4, 3, Rgba([10, 20, 30, 255]));
        grid.put_pixel(1, 2, Rgba([200, 0, 7, 128]));

        write_overlay(&path, &grid).unwrap();
        let first = fs::read(&path).unwrap();
        assert_eq!(load_grid(&path).unwrap(), grid);

        write_overlay(&path, &grid).unwrap();
        assert_eq!(fs::read(&path).unwrap(), first);
    }

    #[test]
    fn test_missing_file_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_grid(dir.path().join("absent.png")).unwrap_err();
        assert!(matches!(err, PairError::Decode { .. }));
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        fs::write(&path, b"definitely not a png").unwrap();
        assert!(matches!(load_grid(&path), Err(PairError::Decode { .. })));
    }
}
