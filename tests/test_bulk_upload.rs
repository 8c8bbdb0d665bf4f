// tests/test_bulk_upload.rs
//
// Bulk upload behaviour: bucket creation, partial failure reporting, and
// successes surviving a failed batch.

mod common;

use anyhow::Result;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tempfile::TempDir;

use common::{payload, BrokenSource, PanicOnDropSource, TestGateway};
use s3bulk::{BytesSource, StorageClient, TransferError, UploadItem};

fn items(count: usize) -> Vec<UploadItem> {
    (0..count)
        .map(|i| {
            let name = format!("file-{i:02}.bin");
            let data = payload(&name, 100 + i);
            UploadItem::from_bytes(name, data)
        })
        .collect()
}

#[tokio::test]
async fn test_upload_creates_missing_bucket_then_stores_all() -> Result<()> {
    let gw = Arc::new(TestGateway::new());
    let client = StorageClient::with_gateway(gw.clone());

    client.bulk_upload("fresh-bucket", items(8)).await?;

    assert_eq!(gw.creates.load(Ordering::SeqCst), 1);
    assert!(client.bucket_exists("fresh-bucket").await?);
    for i in 0..8 {
        let name = format!("file-{i:02}.bin");
        let fetched = client.get_object_bytes("fresh-bucket", &name).await?;
        assert_eq!(fetched, payload(&name, 100 + i));
    }
    Ok(())
}

#[tokio::test]
async fn test_upload_to_existing_bucket_skips_create() -> Result<()> {
    let gw = Arc::new(TestGateway::new());
    gw.inner.insert_object("existing", "keep.txt", &b"old"[..]);

    StorageClient::with_gateway(gw.clone())
        .bulk_upload("existing", items(3))
        .await?;

    assert_eq!(gw.creates.load(Ordering::SeqCst), 0);
    assert_eq!(gw.inner.object_names("existing").len(), 4);
    Ok(())
}

#[tokio::test]
async fn test_partial_failure_lists_exactly_the_failed_files() -> Result<()> {
    let gw = Arc::new(TestGateway::new());
    let denied = ["file-01.bin", "file-04.bin", "file-07.bin"];
    for name in denied {
        gw.deny(name);
    }

    let err = StorageClient::with_gateway(gw.clone())
        .bulk_upload("uploads", items(10))
        .await
        .unwrap_err();

    let bulk = err.as_bulk().expect("aggregate error");
    assert_eq!(bulk.message(), "failed to upload files:");
    assert_eq!(bulk.failed_names(), denied.map(String::from).to_vec());
    for name in denied {
        assert!(bulk.reason(name).unwrap().contains("access denied"));
    }

    // The other seven are stored despite the aggregate error.
    let stored = gw.inner.object_names("uploads");
    assert_eq!(stored.len(), 7);
    for name in denied {
        assert!(!stored.contains(&name.to_string()));
    }
    assert_eq!(gw.puts.load(Ordering::SeqCst), 10);
    Ok(())
}

#[tokio::test]
async fn test_create_failure_stops_before_any_put() {
    let gw = Arc::new(TestGateway::new());
    gw.fail_create.store(true, Ordering::SeqCst);

    let err = StorageClient::with_gateway(gw.clone())
        .bulk_upload("new-bucket", items(5))
        .await
        .unwrap_err();

    assert!(matches!(err, TransferError::CreateBucket { ref bucket, .. } if bucket == "new-bucket"));
    assert!(err.to_string().contains("quota exceeded"));
    assert_eq!(gw.item_calls(), 0);
}

#[tokio::test]
async fn test_bucket_check_error_aborts_upload() {
    let gw = Arc::new(TestGateway::new());
    gw.fail_bucket_check.store(true, Ordering::SeqCst);

    let err = StorageClient::with_gateway(gw.clone())
        .bulk_upload("any", items(2))
        .await
        .unwrap_err();

    assert!(matches!(err, TransferError::BucketCheck { .. }));
    assert_eq!(gw.creates.load(Ordering::SeqCst), 0);
    assert_eq!(gw.item_calls(), 0);
}

#[tokio::test]
async fn test_size_mismatch_is_a_per_item_failure() -> Result<()> {
    let gw = Arc::new(TestGateway::new());
    let mut batch = items(2);
    batch.push(UploadItem::new("liar.bin", BytesSource::new(&b"four"[..]), 40));

    let err = StorageClient::with_gateway(gw.clone())
        .bulk_upload("uploads", batch)
        .await
        .unwrap_err();

    let bulk = err.as_bulk().unwrap();
    assert_eq!(bulk.failed_names(), vec!["liar.bin".to_string()]);
    assert!(bulk.reason("liar.bin").unwrap().contains("declared size 40"));
    assert_eq!(gw.inner.object_names("uploads").len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_upload_local_files() -> Result<()> {
    let dir = TempDir::new()?;
    let mut batch = Vec::new();
    for i in 0..4 {
        let path = dir.path().join(format!("part-{i}.csv"));
        tokio::fs::write(&path, format!("row,{i}\n")).await?;
        batch.push(UploadItem::from_path(&path).await?);
    }
    // Source vanishes between listing and upload.
    let gone = dir.path().join("gone.csv");
    tokio::fs::write(&gone, b"tmp").await?;
    batch.push(UploadItem::from_path(&gone).await?);
    tokio::fs::remove_file(&gone).await?;

    let gw = Arc::new(TestGateway::new());
    let err = StorageClient::with_gateway(gw.clone())
        .bulk_upload("csv", batch)
        .await
        .unwrap_err();

    assert_eq!(err.as_bulk().unwrap().failed_names(), vec!["gone.csv".to_string()]);
    assert_eq!(gw.inner.object("csv", "part-2.csv").unwrap(), &b"row,2\n"[..]);
    Ok(())
}

#[tokio::test]
async fn test_source_stream_failure_is_a_per_item_failure() -> Result<()> {
    let gw = Arc::new(TestGateway::new());
    let mut batch = items(3);
    batch.push(UploadItem::new("torn.bin", BrokenSource { after: 512 }, 2048));

    let err = StorageClient::with_gateway(gw.clone())
        .bulk_upload("uploads", batch)
        .await
        .unwrap_err();

    let bulk = err.as_bulk().unwrap();
    assert_eq!(bulk.failed_names(), vec!["torn.bin".to_string()]);
    let reason = bulk.reason("torn.bin").unwrap();
    assert!(reason.contains("reading source for 'torn.bin'"), "{reason}");
    assert!(reason.contains("connection reset mid-body"), "{reason}");

    // Nothing reached the store for the broken item.
    assert_eq!(gw.puts.load(Ordering::SeqCst), 3);
    assert_eq!(gw.inner.object_names("uploads").len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_worker_dying_after_transfer_still_reports_the_item() -> Result<()> {
    let gw = Arc::new(TestGateway::new());
    let mut batch = items(2);
    batch.push(UploadItem::new("fragile.bin", PanicOnDropSource(payload("fragile.bin", 32)), 32));

    let err = StorageClient::with_gateway(gw.clone())
        .bulk_upload("uploads", batch)
        .await
        .unwrap_err();

    let bulk = err.as_bulk().expect("a dead worker is reported per item");
    assert_eq!(bulk.failed_names(), vec!["fragile.bin".to_string()]);
    assert!(bulk.reason("fragile.bin").unwrap().contains("did not complete"));
    Ok(())
}
