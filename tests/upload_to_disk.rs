//! End-to-end uploads through the filesystem store.

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use photoscale::config::parse_config;
use photoscale::derivatives::ScaleLevel;
use photoscale::pipeline::{AvatarRequest, UploadRequest};
use photoscale::store::FsStore;
use photoscale::urls::BaseUrlResolver;
use photoscale::{PhotoConfig, PhotoError, PipelineError, import_profile_photo, store_upload};
use std::io::Cursor;
use tempfile::TempDir;

fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, 90, (y % 256) as u8])
    });
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageFormat::Jpeg)
        .unwrap();
    out.into_inner()
}

fn request() -> UploadRequest<'static> {
    UploadRequest {
        owner_id: 7,
        nickname: "alice",
        filename: "holiday.jpg",
    }
}

#[test]
fn upload_writes_every_derivative() {
    let tmp = TempDir::new().unwrap();
    let store = FsStore::new(tmp.path());
    let config = parse_config("[urls]\nbase_url = \"https://social.example/\"\n").unwrap();
    let urls = BaseUrlResolver::from_config(&config);

    let result = store_upload(&jpeg(1000, 1000), &request(), &config, &store, &urls).unwrap();
    assert!(result.is_complete());

    let expected = [
        (ScaleLevel::FULL, 1000),
        (ScaleLevel::MEDIUM, 640),
        (ScaleLevel::SMALL, 320),
        (ScaleLevel::THUMB, 160),
    ];
    for (scale, side) in expected {
        let record = store
            .get(7, 0, &result.resource_id, scale)
            .unwrap()
            .unwrap_or_else(|| panic!("scale {} missing", scale.0));
        assert_eq!((record.width, record.height), (side, side));
        assert_eq!(record.mime_type, "image/jpeg");
        assert_eq!(record.filename, "holiday.jpg");

        let img = image::load_from_memory(&record.data).unwrap();
        assert_eq!((img.width(), img.height()), (side, side));
    }

    let rid = result.resource_id.as_str();
    assert_eq!(
        result.url("preview"),
        Some(format!("https://social.example/photo/{rid}-1.jpg").as_str())
    );
    assert_eq!(
        result.url("page"),
        Some(format!("https://social.example/photos/alice/image/{rid}").as_str())
    );
}

#[test]
fn garbage_with_image_magic_is_a_decode_error() {
    let tmp = TempDir::new().unwrap();
    let store = FsStore::new(tmp.path());
    let mut bytes = jpeg(40, 40);
    bytes.truncate(20);

    let result = store_upload(
        &bytes,
        &request(),
        &PhotoConfig::default(),
        &store,
        &BaseUrlResolver::new("https://social.example"),
    );
    assert!(matches!(
        result,
        Err(PipelineError::Photo(PhotoError::Decode(_)))
    ));
    assert!(!tmp.path().join("7").exists());
}

#[test]
fn avatar_import_reuses_resource_on_disk() {
    let tmp = TempDir::new().unwrap();
    let store = FsStore::new(tmp.path());
    let urls = BaseUrlResolver::new("https://social.example");
    let config = PhotoConfig::default();
    let req = AvatarRequest {
        owner_id: 3,
        contact_id: 11,
        filename: "me.jpg",
        content_type: None,
        strict: true,
    };

    let first = import_profile_photo(&jpeg(400, 300), &req, &config, &store, &urls).unwrap();
    let second = import_profile_photo(&jpeg(200, 200), &req, &config, &store, &urls).unwrap();
    assert_eq!(first.resource_id, second.resource_id);

    let rid = second.resource_id.unwrap();
    for (scale, side) in [
        (ScaleLevel::AVATAR_LARGE, 175),
        (ScaleLevel::AVATAR_MEDIUM, 80),
        (ScaleLevel::AVATAR_SMALL, 48),
    ] {
        let record = store.get(3, 11, &rid, scale).unwrap().unwrap();
        assert_eq!((record.width, record.height), (side, side));
        assert!(record.profile);
    }
}
