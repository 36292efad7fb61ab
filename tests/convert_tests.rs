mod common;

use common::*;
use image::DynamicImage;
use img_convert::{
    BatchConverter, ConvertError, ExportOptions, ImageCodec, ItemStage, JpegCodec, PackageLayout,
    ProbeOptions, Quality, Result, ScanOptions, SourceFormat, Workspace,
};
use std::fs;
use std::path::PathBuf;

fn workspace_with(paths: &[PathBuf], quality: u8) -> Workspace {
    let options = ScanOptions {
        probe: ProbeOptions {
            thumbnails: false,
            ..ProbeOptions::default()
        },
        threads: Some(2),
    };
    let mut workspace = Workspace::new(Quality::new(quality).unwrap());
    workspace.submit(paths, &options).unwrap();
    workspace
}

/// Refuses to encode images of one particular width
struct RejectWidth(u32);

impl ImageCodec for RejectWidth {
    fn decode(&self, bytes: &[u8], format: SourceFormat) -> Result<DynamicImage> {
        JpegCodec.decode(bytes, format)
    }

    fn encode(&self, image: &DynamicImage, quality: Quality) -> Result<Vec<u8>> {
        if image.width() == self.0 {
            return Err(ConvertError::Encode("encoder rejected image".to_string()));
        }
        JpegCodec.encode(image, quality)
    }
}

#[test]
fn test_second_entry_encode_failure() {
    let sources = create_temp_directory();
    let dest = create_temp_directory();
    let paths = vec![
        write_image(&sources.path().join("first.png"), 40, 20),
        write_image(&sources.path().join("second.png"), 41, 20),
        write_image(&sources.path().join("third.png"), 42, 20),
    ];
    let workspace = workspace_with(&paths, 85);

    let converter = BatchConverter::with_codec(RejectWidth(41), ExportOptions::default());
    let result = converter.run_job(&workspace.snapshot(), dest.path());

    assert!(result.success);
    assert_eq!(result.message, "2 converted, 1 failed");
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].stage, ItemStage::Encode);
    assert_eq!(
        zip_member_names(&result.output_path.unwrap()),
        vec!["first.jpg", "third.jpg"]
    );
}

#[test]
fn test_unwritable_destination_is_systemic() {
    let sources = create_temp_directory();
    let paths = vec![write_image(&sources.path().join("a.png"), 16, 16)];
    let workspace = workspace_with(&paths, 85);

    let blocker = sources.path().join("occupied");
    fs::write(&blocker, b"regular file").unwrap();
    let destination = blocker.join("export");

    let result = BatchConverter::default().run_job(&workspace.snapshot(), &destination);

    assert!(!result.success);
    assert!(result.output_path.is_none());
    assert!(result.message.contains("occupied"));
    assert!(!destination.exists());
}

#[test]
fn test_colliding_names_are_suffixed() {
    let sources = create_temp_directory();
    let other = sources.path().join("other");
    fs::create_dir(&other).unwrap();
    let dest = create_temp_directory();
    let paths = vec![
        write_image(&sources.path().join("IMG_1.png"), 8, 8),
        write_image(&other.join("IMG_1.bmp"), 8, 8),
        write_image(&other.join("img_1.jpg"), 8, 8),
    ];
    let workspace = workspace_with(&paths, 85);

    let result = BatchConverter::default().run_job(&workspace.snapshot(), dest.path());

    assert_eq!(result.converted, 3);
    assert_eq!(
        zip_member_names(&result.output_path.unwrap()),
        vec!["IMG_1 (1).jpg", "IMG_1.jpg", "img_1 (2).jpg"]
    );
}

#[test]
fn test_archive_members_convert() {
    let sources = create_temp_directory();
    let dest = create_temp_directory();
    let archive = write_image_zip(
        &sources.path().join("album.zip"),
        &[("a.png", 12, 12), ("nested/b.png", 24, 12)],
    );
    let workspace = workspace_with(&[archive], 60);

    let converter = BatchConverter::new(ExportOptions {
        layout: PackageLayout::Directory,
        max_workers: Some(2),
    });
    let result = converter.run_job(&workspace.snapshot(), dest.path());

    assert!(result.success);
    let output = result.output_path.unwrap();
    let written = image::open(output.join("b.jpg")).unwrap();
    assert_eq!((written.width(), written.height()), (24, 12));
    assert!(output.join("a.jpg").is_file());
}

#[test]
fn test_snapshot_quality_is_used() {
    let sources = create_temp_directory();
    let low_dest = create_temp_directory();
    let high_dest = create_temp_directory();
    let paths = vec![write_image(&sources.path().join("a.png"), 96, 96)];

    let mut workspace = workspace_with(&paths, 10);
    let low_job = workspace.snapshot();
    workspace.set_quality(Quality::new(95).unwrap());
    let high_job = workspace.snapshot();

    let converter = BatchConverter::default();
    let low = converter.run_job(&low_job, low_dest.path());
    let high = converter.run_job(&high_job, high_dest.path());

    assert!(low.output_bytes < high.output_bytes);
}

#[test]
fn test_no_entries_is_rejected() {
    let dest = create_temp_directory();
    let workspace = Workspace::default();

    let result = BatchConverter::default().run_job(&workspace.snapshot(), dest.path());

    assert!(!result.success);
    assert_eq!(result.message, "No entries to convert");
    assert_eq!(fs::read_dir(dest.path()).unwrap().count(), 0);
}
