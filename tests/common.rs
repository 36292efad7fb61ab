#![allow(dead_code)]

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::fs::File;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

pub fn create_temp_directory() -> TempDir {
    TempDir::new().unwrap()
}

pub fn gradient(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 5 % 256) as u8, (y * 3 % 256) as u8, ((x + y) % 256) as u8])
    }))
}

/// Writes a real image, format chosen by extension. Returns the canonical path.
pub fn write_image(path: &Path, width: u32, height: u32) -> PathBuf {
    gradient(width, height).save(path).unwrap();
    path.canonicalize().unwrap()
}

/// A file with an image extension whose contents are not an image
pub fn write_corrupt_image(path: &Path) -> PathBuf {
    File::create(path)
        .unwrap()
        .write_all(b"this is not really an image")
        .unwrap();
    path.canonicalize().unwrap()
}

pub fn image_bytes(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let mut buffer = Vec::new();
    gradient(width, height)
        .write_to(&mut Cursor::new(&mut buffer), format)
        .unwrap();
    buffer
}

/// Zip whose members are real PNG images of the given sizes
pub fn write_image_zip(path: &Path, members: &[(&str, u32, u32)]) -> PathBuf {
    let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
    for (name, width, height) in members {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer
            .write_all(&image_bytes(*width, *height, ImageFormat::Png))
            .unwrap();
    }
    writer.finish().unwrap();
    path.canonicalize().unwrap()
}

/// Four readable images and one corrupt one, as five separate paths
pub fn create_photo_set(dir: &Path) -> Vec<PathBuf> {
    vec![
        write_image(&dir.join("beach.png"), 64, 48),
        write_image(&dir.join("city.jpg"), 48, 64),
        write_image(&dir.join("forest.bmp"), 32, 32),
        write_corrupt_image(&dir.join("broken.png")),
        write_image(&dir.join("sunset.png"), 80, 40),
    ]
}

pub fn zip_member_names(path: &Path) -> Vec<String> {
    let archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_owned).collect();
    names.sort();
    names
}
