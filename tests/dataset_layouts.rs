//! Discovery and decoding of the built-in dataset layouts

mod common;

use common::{write_class_image, write_color_label, write_gray_label, write_palette_label};
use ndarray::{array, Array2};
use segeval::dataset::voc_colormap;
use segeval::{DatasetKind, DatasetOptions, SegEvalError, SegmentationDataset};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn tiny() -> Array2<u8> {
    array![[0, 1], [2, 3]]
}

#[test]
fn test_cityscapes_layout() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    for (city, frame) in [("munster", "000001_000019"), ("frankfurt", "000000_000294")] {
        write_class_image(
            &root.join(format!("leftImg8bit/val/{city}/{city}_{frame}_leftImg8bit.png")),
            &tiny(),
        );
        write_gray_label(
            &root.join(format!("gtFine/val/{city}/{city}_{frame}_gtFine_labelTrainIds.png")),
            &array![[0, 18], [255, 7]],
        );
    }

    let dataset = DatasetKind::Cityscapes
        .open(&DatasetOptions::new(root))
        .unwrap();

    assert_eq!(dataset.name(), "Cityscapes");
    assert_eq!(dataset.num_classes(), 19);
    assert_eq!(dataset.len(), 2);

    // Sorted by path: frankfurt before munster
    let first = dataset.sample(0).unwrap();
    assert_eq!(first.id, "frankfurt_000000_000294_leftImg8bit");
    assert_eq!(first.label, array![[0u32, 18], [255, 7]]);
    assert_eq!(first.image.shape(), &[1, 3, 2, 2]);
    assert!((first.image[[0, 0, 1, 1]] - 3.0).abs() < f32::EPSILON);
}

#[test]
fn test_cityscapes_missing_label_is_reported() {
    let dir = TempDir::new().unwrap();
    write_class_image(
        &dir.path().join("leftImg8bit/val/ulm/ulm_000000_000019_leftImg8bit.png"),
        &tiny(),
    );

    let err = DatasetKind::Cityscapes
        .open(&DatasetOptions::new(dir.path()))
        .unwrap_err();
    assert!(err.to_string().contains("ulm_000000_000019_gtFine_labelTrainIds.png"));
}

fn write_voc(base: &Path) {
    fs::create_dir_all(base.join("ImageSets/Segmentation")).unwrap();
    fs::write(
        base.join("ImageSets/Segmentation/val.txt"),
        "2007_000033\n\n2007_000042\n",
    )
    .unwrap();

    for id in ["2007_000033", "2007_000042"] {
        write_class_image(&base.join(format!("JPEGImages/{id}.jpg")), &tiny());
        write_color_label(
            &base.join(format!("SegmentationClass/{id}.png")),
            &[
                voc_colormap(0),
                voc_colormap(15),
                voc_colormap(255),
                voc_colormap(20),
            ],
            2,
        );
    }
}

#[test]
fn test_pascal_voc_layout_under_devkit() {
    let dir = TempDir::new().unwrap();
    write_voc(&dir.path().join("VOC2012"));

    let dataset = DatasetKind::PascalVoc
        .open(&DatasetOptions::new(dir.path()))
        .unwrap();

    assert_eq!(dataset.name(), "PascalVOC");
    assert_eq!(dataset.num_classes(), 21);
    assert_eq!(dataset.len(), 2);

    let sample = dataset.sample(1).unwrap();
    assert_eq!(sample.id, "2007_000042");
    assert_eq!(sample.label, array![[0u32, 15], [255, 20]]);
}

#[test]
fn test_pascal_voc_root_is_voc2012() {
    let dir = TempDir::new().unwrap();
    write_voc(dir.path());

    let options = DatasetOptions::new(dir.path()).with_ignore_index(254);
    let dataset = DatasetKind::PascalVoc.open(&options).unwrap();
    let sample = dataset.sample(0).unwrap();
    // Border pixels map to the configured ignore index
    assert_eq!(sample.label[[1, 0]], 254);
}

#[test]
fn test_pascal_voc_missing_split() {
    let dir = TempDir::new().unwrap();
    write_voc(dir.path());

    let options = DatasetOptions::new(dir.path()).with_mode("train");
    let err = DatasetKind::PascalVoc.open(&options).unwrap_err();
    assert!(matches!(err, SegEvalError::InvalidConfig(_)));

    let options = DatasetOptions::new(dir.path()).with_mode("test");
    assert!(DatasetKind::PascalVoc.open(&options).is_err());
}

fn write_ade(base: &Path, split: &str) {
    for name in ["ADE_val_00000002", "ADE_val_00000001"] {
        write_class_image(&base.join(format!("images/{split}/{name}.jpg")), &tiny());
        write_gray_label(
            &base.join(format!("annotations/{split}/{name}.png")),
            &array![[0, 1], [150, 3]],
        );
    }
    // Non-image files are skipped
    fs::write(base.join(format!("images/{split}/notes.txt")), "ignored").unwrap();
}

#[test]
fn test_ade20k_layout_reduces_zero() {
    let dir = TempDir::new().unwrap();
    write_ade(&dir.path().join("ADEChallengeData2016"), "validation");

    let dataset = DatasetKind::Ade20k
        .open(&DatasetOptions::new(dir.path()))
        .unwrap();

    assert_eq!(dataset.name(), "ADE20K");
    assert_eq!(dataset.num_classes(), 150);
    assert_eq!(dataset.len(), 2);

    let sample = dataset.sample(0).unwrap();
    assert_eq!(sample.id, "ADE_val_00000001");
    assert_eq!(sample.label, array![[255u32, 0], [149, 2]]);
}

#[test]
fn test_ade20k_training_split_at_root() {
    let dir = TempDir::new().unwrap();
    write_ade(dir.path(), "training");

    let options = DatasetOptions::new(dir.path()).with_mode("train");
    let dataset = DatasetKind::Ade20k.open(&options).unwrap();
    assert_eq!(dataset.len(), 2);

    // The validation split does not exist here
    assert!(DatasetKind::Ade20k.open(&DatasetOptions::new(dir.path())).is_err());
}

#[test]
fn test_custom_list_file_fallback_name() {
    let dir = TempDir::new().unwrap();
    write_class_image(&dir.path().join("a/img.png"), &tiny());
    write_gray_label(&dir.path().join("b/gt.png"), &tiny());
    fs::write(dir.path().join("test_list.txt"), "a/img.png   b/gt.png\n").unwrap();

    let options = DatasetOptions::new(dir.path())
        .with_mode("test")
        .with_num_classes(Some(4));
    let dataset = DatasetKind::Custom.open(&options).unwrap();

    assert_eq!(dataset.num_classes(), 4);
    assert_eq!(dataset.entries()[0].image, dir.path().join("a/img.png"));
    assert_eq!(dataset.sample(0).unwrap().label, array![[0u32, 1], [2, 3]]);
}

#[test]
fn test_image_label_size_mismatch() {
    let dir = TempDir::new().unwrap();
    write_class_image(&dir.path().join("img.png"), &tiny());
    write_gray_label(&dir.path().join("gt.png"), &Array2::zeros((3, 2)));
    fs::write(dir.path().join("val.txt"), "img.png gt.png\n").unwrap();

    let options = DatasetOptions::new(dir.path()).with_num_classes(Some(4));
    let dataset = DatasetKind::Custom.open(&options).unwrap();
    let err = dataset.sample(0).unwrap_err();
    assert!(err.to_string().contains("differ in size"));
}

#[test]
fn test_builtin_class_count_mismatch() {
    let dir = TempDir::new().unwrap();
    let options = DatasetOptions::new(dir.path()).with_num_classes(Some(20));
    let err = DatasetKind::Cityscapes.open(&options).unwrap_err();
    assert!(err.to_string().contains("19"));
}

#[test]
fn test_custom_palette_png_labels_are_indices() {
    let dir = TempDir::new().unwrap();
    write_class_image(&dir.path().join("img.png"), &tiny());
    write_palette_label(&dir.path().join("gt.png"), &array![[0, 3], [255, 1]]);
    fs::write(dir.path().join("val.txt"), "img.png gt.png\n").unwrap();

    let options = DatasetOptions::new(dir.path()).with_num_classes(Some(4));
    let dataset = DatasetKind::Custom.open(&options).unwrap();
    assert_eq!(dataset.sample(0).unwrap().label, array![[0u32, 3], [255, 1]]);
}

#[test]
fn test_pascal_voc_indexed_labels() {
    let dir = TempDir::new().unwrap();
    write_voc(dir.path());
    // Official VOC annotations are palette PNGs with 255 on object borders
    write_palette_label(
        &dir.path().join("SegmentationClass/2007_000033.png"),
        &array![[0, 15], [255, 20]],
    );

    let options = DatasetOptions::new(dir.path()).with_ignore_index(254);
    let dataset = DatasetKind::PascalVoc.open(&options).unwrap();
    assert_eq!(dataset.sample(0).unwrap().label, array![[0u32, 15], [254, 20]]);
}
