mod common;

use anyhow::Result;
use aster_dl::{
    dataset::{FileDataset, LabeledImageDataset, RandomAccessDataset},
    error::DatasetError,
    processor::default_transform,
};
use common::{dataset_dirs, write_png};
use label::LabelErrorKind;
use std::fs;
use tch::Kind;

#[tokio::test]
async fn enumerate_recognized_images() -> Result<()> {
    let (_root, image_dir, label_dir) = dataset_dirs()?;
    write_png(&image_dir.join("b.png"), 8, 6, 10)?;
    write_png(&image_dir.join("a.PNG"), 8, 6, 20)?;
    write_png(&image_dir.join("c.jpg"), 8, 6, 30)?;
    fs::write(image_dir.join("notes.txt"), "not an image")?;
    fs::create_dir(image_dir.join("nested.png"))?;

    let dataset = LabeledImageDataset::load(&image_dir, &label_dir, None).await?;
    assert_eq!(dataset.num_records(), 3);

    let names: Vec<_> = dataset
        .records()
        .iter()
        .map(|record| record.name().unwrap().to_owned())
        .collect();
    assert_eq!(names, ["a.PNG", "b.png", "c.jpg"]);
    assert_eq!(dataset.records()[1].label_file, label_dir.join("b.txt"));

    Ok(())
}

#[tokio::test]
async fn image_without_label_file_has_no_labels() -> Result<()> {
    let (_root, image_dir, label_dir) = dataset_dirs()?;
    write_png(&image_dir.join("frame.png"), 8, 6, 128)?;

    let dataset = LabeledImageDataset::load(&image_dir, &label_dir, None).await?;
    let record = dataset.nth(0).await?;
    assert!(record.labels.is_empty());
    assert_eq!(record.image.size(), vec![3, 6, 8]);
    assert_eq!(record.image.kind(), Kind::Uint8);

    Ok(())
}

#[tokio::test]
async fn labels_are_read_in_file_order() -> Result<()> {
    let (_root, image_dir, label_dir) = dataset_dirs()?;
    write_png(&image_dir.join("frame.01.png"), 8, 6, 128)?;
    fs::write(
        label_dir.join("frame.01.txt"),
        "0 0.5 0.5 0.2 0.2\n\n1 0.25 0.75 0.1 0.3\n",
    )?;

    let dataset = LabeledImageDataset::load(&image_dir, &label_dir, None).await?;
    let record = dataset.nth(0).await?;
    assert_eq!(record.labels.len(), 2);
    assert_eq!(record.labels[0].to_array(), [0.0, 0.5, 0.5, 0.2, 0.2]);
    assert_eq!(record.labels[1].to_array(), [1.0, 0.25, 0.75, 0.1, 0.3]);

    Ok(())
}

#[tokio::test]
async fn malformed_label_fails_the_record() -> Result<()> {
    let (_root, image_dir, label_dir) = dataset_dirs()?;
    write_png(&image_dir.join("frame.png"), 8, 6, 128)?;
    fs::write(label_dir.join("frame.txt"), "1 0.5 0.5\n")?;

    let dataset = LabeledImageDataset::load(&image_dir, &label_dir, None).await?;
    let err = dataset.nth(0).await.unwrap_err();
    match err.downcast_ref::<DatasetError>() {
        Some(DatasetError::LabelParse { path, source }) => {
            assert_eq!(path, &label_dir.join("frame.txt"));
            assert_eq!(source.line, 1);
        }
        other => panic!("unexpected error {:?}", other),
    }

    Ok(())
}

#[tokio::test]
async fn corrupt_image_fails_to_decode() -> Result<()> {
    let (_root, image_dir, label_dir) = dataset_dirs()?;
    fs::write(image_dir.join("broken.png"), b"definitely not a png")?;

    let dataset = LabeledImageDataset::load(&image_dir, &label_dir, None).await?;
    let err = dataset.nth(0).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DatasetError>(),
        Some(DatasetError::Decode { .. })
    ));

    Ok(())
}

#[tokio::test]
async fn out_of_range_index() -> Result<()> {
    let (_root, image_dir, label_dir) = dataset_dirs()?;
    write_png(&image_dir.join("frame.png"), 8, 6, 128)?;

    let dataset = LabeledImageDataset::load(&image_dir, &label_dir, None).await?;
    let err = dataset.nth(1).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DatasetError>(),
        Some(DatasetError::IndexOutOfRange { index: 1, len: 1 })
    ));

    Ok(())
}

#[tokio::test]
async fn missing_label_dir_is_an_io_error() -> Result<()> {
    let (root, image_dir, _label_dir) = dataset_dirs()?;
    let missing = root.path().join("missing");

    let err = LabeledImageDataset::load(&image_dir, &missing, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DatasetError>(),
        Some(DatasetError::Io { .. })
    ));

    Ok(())
}

#[tokio::test]
async fn missing_image_dir_is_an_io_error() -> Result<()> {
    let (root, _image_dir, label_dir) = dataset_dirs()?;
    let missing = root.path().join("missing");

    let err = LabeledImageDataset::load(&missing, &label_dir, None)
        .await
        .unwrap_err();
    match err.downcast_ref::<DatasetError>() {
        Some(DatasetError::Io { path, .. }) => assert_eq!(path, &missing),
        other => panic!("unexpected error {:?}", other),
    }

    Ok(())
}

#[tokio::test]
async fn non_utf8_label_is_a_parse_error() -> Result<()> {
    let (_root, image_dir, label_dir) = dataset_dirs()?;
    write_png(&image_dir.join("frame.png"), 8, 6, 128)?;
    fs::write(label_dir.join("frame.txt"), b"0 0.5 0.5 0.2 0.2\n\xfe\xff\n")?;

    let dataset = LabeledImageDataset::load(&image_dir, &label_dir, None).await?;
    let err = dataset.nth(0).await.unwrap_err();
    match err.downcast_ref::<DatasetError>() {
        Some(DatasetError::LabelParse { source, .. }) => {
            assert_eq!(source.line, 2);
            assert_eq!(source.kind, LabelErrorKind::InvalidUtf8);
        }
        other => panic!("unexpected error {:?}", other),
    }

    Ok(())
}

#[tokio::test]
async fn transform_is_applied() -> Result<()> {
    let (_root, image_dir, label_dir) = dataset_dirs()?;
    write_png(&image_dir.join("frame.png"), 40, 30, 255)?;

    let dataset =
        LabeledImageDataset::load(&image_dir, &label_dir, Some(default_transform(32))).await?;
    let record = dataset.nth(0).await?;
    assert_eq!(record.image.size(), vec![3, 32, 32]);
    assert_eq!(record.image.kind(), Kind::Float);
    assert!((record.image.max().double_value(&[]) - 1.0).abs() < 1e-6);

    Ok(())
}

#[test]
fn load_record_without_runtime() -> Result<()> {
    let (_root, image_dir, label_dir) = dataset_dirs()?;
    write_png(&image_dir.join("frame.png"), 8, 6, 128)?;
    fs::write(label_dir.join("frame.txt"), "2 0.5 0.5 0.2 0.2\n")?;

    let runtime = tokio::runtime::Runtime::new()?;
    let dataset = runtime.block_on(LabeledImageDataset::load(&image_dir, &label_dir, None))?;
    let record = dataset.load_record(0)?;
    assert_eq!(record.labels[0].class_id, 2);

    Ok(())
}
