//! Dispatch engine integration tests.
//!
//! Run with: `cargo test -p disparo-engine --test dispatch_test`
//! Uses in-process fakes for storage, audience, and persistence.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use disparo_core::{
    BroadcastRecord, BroadcastStatus, CompanyScope, DispatchError, FailureStage, FilterCriterion,
    FilterDimension, FilterSet, StorageBackend, UploadPolicy, UploadStrategy,
};
use disparo_engine::{
    AssetMeta, AssetPayload, AudienceSource, BroadcastStore, DispatchDraft, DispatchEngine,
};
use disparo_storage::{ObjectStorage, StorageError, StorageResult};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
enum StorageCall {
    Object { key: String, bytes: usize },
    Chunk { key: String, bytes: usize, is_first: bool },
}

/// In-memory storage with call recording and per-key failure injection.
#[derive(Default)]
struct FakeStorage {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    calls: Mutex<Vec<StorageCall>>,
    /// Keys containing this substring fail every `upload_object` call.
    fail_direct_containing: Option<String>,
    /// Keys containing the substring fail at this chunk index.
    fail_chunk_containing: Option<(String, usize)>,
    chunk_counts: Mutex<HashMap<String, usize>>,
}

impl FakeStorage {
    fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(&format!("{}/{}", bucket, key))
            .cloned()
    }

    fn calls(&self) -> Vec<StorageCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn upload_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        _content_type: &str,
    ) -> StorageResult<()> {
        self.calls.lock().unwrap().push(StorageCall::Object {
            key: key.to_string(),
            bytes: data.len(),
        });
        if let Some(needle) = &self.fail_direct_containing {
            if key.contains(needle.as_str()) {
                return Err(StorageError::UploadFailed("injected 500".to_string()));
            }
        }
        self.objects
            .lock()
            .unwrap()
            .insert(format!("{}/{}", bucket, key), data.to_vec());
        Ok(())
    }

    async fn upload_chunk(
        &self,
        bucket: &str,
        key: &str,
        chunk: Bytes,
        _content_type: &str,
        is_first: bool,
    ) -> StorageResult<()> {
        self.calls.lock().unwrap().push(StorageCall::Chunk {
            key: key.to_string(),
            bytes: chunk.len(),
            is_first,
        });

        let index = {
            let mut counts = self.chunk_counts.lock().unwrap();
            let slot = counts.entry(key.to_string()).or_insert(0);
            let index = *slot;
            *slot += 1;
            index
        };
        if let Some((needle, fail_at)) = &self.fail_chunk_containing {
            if key.contains(needle.as_str()) && index == *fail_at {
                return Err(StorageError::ChunkFailed("injected chunk error".to_string()));
            }
        }

        let mut objects = self.objects.lock().unwrap();
        let entry = objects.entry(format!("{}/{}", bucket, key)).or_default();
        if is_first {
            entry.clear();
        }
        entry.extend_from_slice(&chunk);
        Ok(())
    }

    async fn public_url(&self, bucket: &str, key: &str) -> StorageResult<String> {
        if self.object(bucket, key).is_none() {
            return Err(StorageError::NotFound(key.to_string()));
        }
        Ok(format!("https://cdn.test/{}/{}", bucket, key))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

struct FakeAudience {
    count: u64,
    calls: AtomicUsize,
    fail: bool,
}

impl FakeAudience {
    fn returning(count: u64) -> Self {
        Self {
            count,
            calls: AtomicUsize::new(0),
            fail: false,
        }
    }
}

#[async_trait]
impl AudienceSource for FakeAudience {
    async fn count_recipients(
        &self,
        _company_uid: Uuid,
        _filters: &FilterSet,
    ) -> anyhow::Result<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("connection refused");
        }
        Ok(self.count)
    }

    async fn distinct_values(
        &self,
        _company_uid: Uuid,
        dimension: FilterDimension,
    ) -> anyhow::Result<Vec<String>> {
        if self.fail {
            anyhow::bail!("connection refused");
        }
        Ok(match dimension {
            FilterDimension::City => vec!["Fortaleza".to_string(), "Natal".to_string()],
            FilterDimension::Neighborhood => vec!["Aldeota".to_string()],
            FilterDimension::Category => vec!["Apoiador".to_string()],
            FilterDimension::Gender => vec!["F".to_string(), "M".to_string()],
        })
    }
}

#[derive(Default)]
struct FakeStore {
    inserted: Mutex<Vec<BroadcastRecord>>,
    fail: bool,
}

#[async_trait]
impl BroadcastStore for FakeStore {
    async fn insert_broadcast(&self, record: &BroadcastRecord) -> anyhow::Result<Uuid> {
        if self.fail {
            anyhow::bail!("unique constraint violation");
        }
        self.inserted.lock().unwrap().push(record.clone());
        Ok(Uuid::new_v4())
    }
}

fn test_policy() -> UploadPolicy {
    UploadPolicy {
        max_file_size_bytes: 10_000,
        direct_threshold_bytes: 1_000,
        chunk_size_bytes: 256,
        max_concurrent_uploads: 2,
        ..UploadPolicy::default()
    }
}

fn company() -> CompanyScope {
    CompanyScope {
        uid: Uuid::new_v4(),
        name: "Campanha São João".to_string(),
    }
}

fn draft(attachments: Vec<AssetPayload>) -> DispatchDraft {
    DispatchDraft {
        company: company(),
        created_by: "operator@example.com".to_string(),
        message: "Olá *{recipient_name}*, evento amanhã!".to_string(),
        filters: FilterSet::new(vec![FilterCriterion {
            dimension: FilterDimension::City,
            value: "Fortaleza".to_string(),
        }]),
        attachments,
    }
}

fn engine(
    storage: Arc<FakeStorage>,
    audience: Arc<FakeAudience>,
    store: Arc<FakeStore>,
) -> DispatchEngine {
    DispatchEngine::new(storage, audience, store, test_policy())
}

#[tokio::test]
async fn oversize_attachment_rejected_before_any_storage_call() {
    let storage = Arc::new(FakeStorage::default());
    let audience = Arc::new(FakeAudience::returning(10));
    let store = Arc::new(FakeStore::default());
    let engine = engine(storage.clone(), audience.clone(), store.clone());

    let big = AssetPayload::new("huge.png", "image/png", vec![0u8; 20_000]);
    let err = engine.submit(draft(vec![big])).await.unwrap_err();

    match err {
        DispatchError::Validation { failures, .. } => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].filename, "huge.png");
            assert_eq!(failures[0].stage, FailureStage::Validation);
            assert!(failures[0].strategy.is_none());
        }
        other => panic!("expected validation failure, got {:?}", other),
    }
    assert!(storage.calls().is_empty(), "no bytes should leave the process");
    assert_eq!(audience.calls.load(Ordering::SeqCst), 0);
    assert!(store.inserted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn disallowed_content_type_rejected_at_validation() {
    let storage = Arc::new(FakeStorage::default());
    let engine = engine(
        storage.clone(),
        Arc::new(FakeAudience::returning(1)),
        Arc::new(FakeStore::default()),
    );

    let exe = AssetPayload::new("tool.exe", "application/x-msdownload", vec![0u8; 16]);
    let err = engine.submit(draft(vec![exe])).await.unwrap_err();

    assert!(matches!(err, DispatchError::Validation { .. }));
    assert!(storage.calls().is_empty());
}

#[tokio::test]
async fn small_file_uploads_direct() {
    let storage = Arc::new(FakeStorage::default());
    let store = Arc::new(FakeStore::default());
    let engine = engine(storage.clone(), Arc::new(FakeAudience::returning(7)), store.clone());

    let payload = AssetPayload::new("foto perfil.png", "image/png", vec![1u8; 500]);
    let receipt = engine.submit(draft(vec![payload])).await.unwrap();

    assert_eq!(receipt.status, BroadcastStatus::Ready);
    assert_eq!(receipt.resolved_audience_size, 7);

    let inserted = store.inserted.lock().unwrap();
    let asset = &inserted[0].attachments[0];
    assert_eq!(asset.upload_strategy, Some(UploadStrategy::Direct));
    assert_eq!(asset.uploaded_bytes, 500);
    assert!(asset.public_url.as_deref().unwrap().starts_with("https://cdn.test/"));
    let key = asset.storage_key.as_deref().unwrap();
    assert!(key.starts_with("disparos/"));
    assert!(key.ends_with("-foto_perfil.png"));

    let calls = storage.calls();
    assert_eq!(calls.len(), 1);
    assert!(matches!(calls[0], StorageCall::Object { bytes: 500, .. }));
}

#[tokio::test]
async fn large_file_is_chunked_and_byte_identical() {
    let storage = Arc::new(FakeStorage::default());
    let store = Arc::new(FakeStore::default());
    let engine = engine(storage.clone(), Arc::new(FakeAudience::returning(1)), store.clone());

    let payload: Vec<u8> = (0..5_000u32).map(|i| (i % 251) as u8).collect();
    let asset = AssetPayload::new("comício.mp4", "video/mp4", payload.clone());
    engine.submit(draft(vec![asset])).await.unwrap();

    let inserted = store.inserted.lock().unwrap();
    let uploaded = &inserted[0].attachments[0];
    assert_eq!(uploaded.upload_strategy, Some(UploadStrategy::Chunked));
    assert_eq!(uploaded.uploaded_bytes, 5_000);

    let bucket = inserted[0].company.bucket().unwrap();
    let key = uploaded.storage_key.as_deref().unwrap();
    assert_eq!(storage.object(&bucket, key).unwrap(), payload);

    let chunk_calls: Vec<_> = storage
        .calls()
        .into_iter()
        .filter(|c| matches!(c, StorageCall::Chunk { .. }))
        .collect();
    assert_eq!(chunk_calls.len(), 5_000usize.div_ceil(256));
    assert!(matches!(chunk_calls[0], StorageCall::Chunk { is_first: true, .. }));
    assert!(chunk_calls[1..]
        .iter()
        .all(|c| matches!(c, StorageCall::Chunk { is_first: false, .. })));
}

#[tokio::test]
async fn direct_failure_falls_back_to_chunked_once() {
    let storage = Arc::new(FakeStorage {
        fail_direct_containing: Some("panfleto".to_string()),
        ..FakeStorage::default()
    });
    let store = Arc::new(FakeStore::default());
    let engine = engine(storage.clone(), Arc::new(FakeAudience::returning(1)), store.clone());

    let asset = AssetPayload::new("panfleto.pdf", "application/pdf", vec![9u8; 800]);
    engine.submit(draft(vec![asset])).await.unwrap();

    let inserted = store.inserted.lock().unwrap();
    let uploaded = &inserted[0].attachments[0];
    assert_eq!(uploaded.upload_strategy, Some(UploadStrategy::Chunked));
    assert_eq!(uploaded.uploaded_bytes, 800);

    let calls = storage.calls();
    let direct_attempts = calls
        .iter()
        .filter(|c| matches!(c, StorageCall::Object { .. }))
        .count();
    assert_eq!(direct_attempts, 1, "exactly one direct attempt before fallback");

    let bucket = inserted[0].company.bucket().unwrap();
    let key = uploaded.storage_key.as_deref().unwrap();
    assert_eq!(storage.object(&bucket, key).unwrap(), vec![9u8; 800]);
}

#[tokio::test]
async fn chunk_failure_is_terminal_for_the_asset() {
    let storage = Arc::new(FakeStorage {
        fail_chunk_containing: Some(("debate".to_string(), 2)),
        ..FakeStorage::default()
    });
    let engine = engine(
        storage.clone(),
        Arc::new(FakeAudience::returning(1)),
        Arc::new(FakeStore::default()),
    );

    let asset = AssetPayload::new("debate.mp4", "video/mp4", vec![3u8; 2_000]);
    let err = engine.submit(draft(vec![asset])).await.unwrap_err();

    match err {
        DispatchError::Upload { failures } => {
            assert_eq!(failures[0].stage, FailureStage::Upload);
            assert_eq!(failures[0].strategy, Some(UploadStrategy::Chunked));
        }
        other => panic!("expected upload failure, got {:?}", other),
    }

    // No writes after the failed chunk: indices 0 and 1 landed, 2 failed.
    let chunk_calls = storage
        .calls()
        .into_iter()
        .filter(|c| matches!(c, StorageCall::Chunk { .. }))
        .count();
    assert_eq!(chunk_calls, 3);
}

#[tokio::test]
async fn one_failed_asset_fails_the_dispatch_but_siblings_stay_in_storage() {
    let storage = Arc::new(FakeStorage {
        fail_direct_containing: Some("ruim".to_string()),
        fail_chunk_containing: Some(("ruim".to_string(), 0)),
        ..FakeStorage::default()
    });
    let store = Arc::new(FakeStore::default());
    let engine = engine(storage.clone(), Arc::new(FakeAudience::returning(1)), store.clone());

    let good = AssetPayload::new("bom.png", "image/png", vec![1u8; 100]);
    let bad = AssetPayload::new("ruim.png", "image/png", vec![2u8; 100]);
    let d = draft(vec![good, bad]);
    let bucket = d.company.bucket().unwrap();

    let err = engine.submit(d).await.unwrap_err();
    match err {
        DispatchError::Upload { failures } => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].filename, "ruim.png");
        }
        other => panic!("expected upload failure, got {:?}", other),
    }

    // The sibling that succeeded is not retracted.
    let kept = storage
        .objects
        .lock()
        .unwrap()
        .keys()
        .filter(|k| k.starts_with(&bucket) && k.contains("bom"))
        .count();
    assert_eq!(kept, 1);
    assert!(store.inserted.lock().unwrap().is_empty(), "failed dispatch never persisted");
}

#[tokio::test]
async fn zero_attachment_dispatch_snapshots_audience_once() {
    let audience = Arc::new(FakeAudience::returning(1_234));
    let store = Arc::new(FakeStore::default());
    let engine = engine(Arc::new(FakeStorage::default()), audience.clone(), store.clone());

    let receipt = engine.submit(draft(vec![])).await.unwrap();

    assert_eq!(receipt.status, BroadcastStatus::Ready);
    assert_eq!(receipt.resolved_audience_size, 1_234);
    assert_eq!(audience.calls.load(Ordering::SeqCst), 1);

    let inserted = store.inserted.lock().unwrap();
    assert_eq!(inserted.len(), 1);
    assert!(inserted[0].attachments.is_empty());
    assert_eq!(inserted[0].resolved_audience_size, 1_234);
}

#[tokio::test]
async fn attachment_order_is_preserved_under_concurrency() {
    let store = Arc::new(FakeStore::default());
    let engine = engine(
        Arc::new(FakeStorage::default()),
        Arc::new(FakeAudience::returning(1)),
        store.clone(),
    );

    let attachments: Vec<AssetPayload> = (0..6usize)
        .map(|i| {
            AssetPayload::new(
                format!("anexo-{}.png", i),
                "image/png",
                vec![i as u8; 2_000 - i * 100],
            )
        })
        .collect();

    engine.submit(draft(attachments)).await.unwrap();

    let inserted = store.inserted.lock().unwrap();
    let names: Vec<_> = inserted[0]
        .attachments
        .iter()
        .map(|a| a.original_filename.as_str())
        .collect();
    assert_eq!(
        names,
        vec!["anexo-0.png", "anexo-1.png", "anexo-2.png", "anexo-3.png", "anexo-4.png", "anexo-5.png"]
    );
}

#[tokio::test]
async fn persistence_failure_is_reported_after_uploads() {
    let storage = Arc::new(FakeStorage::default());
    let store = Arc::new(FakeStore {
        fail: true,
        ..FakeStore::default()
    });
    let engine = engine(storage.clone(), Arc::new(FakeAudience::returning(1)), store);

    let first = AssetPayload::new("a.png", "image/png", vec![1u8; 10]);
    let second = AssetPayload::new("b.png", "image/png", vec![2u8; 10]);
    let d = draft(vec![first, second]);
    let bucket = d.company.bucket().unwrap();

    let err = engine.submit(d).await.unwrap_err();
    assert!(matches!(err, DispatchError::Persistence(_)));

    // Both uploads happened and their public URLs still resolve.
    let prefix = format!("{}/", bucket);
    let keys: Vec<String> = storage
        .objects
        .lock()
        .unwrap()
        .keys()
        .filter_map(|k| k.strip_prefix(&prefix).map(str::to_string))
        .collect();
    assert_eq!(keys.len(), 2);
    for key in keys {
        let url = storage.public_url(&bucket, &key).await.unwrap();
        assert!(url.starts_with("https://cdn.test/"));
    }
}

#[tokio::test]
async fn too_many_attachments_rejected_before_any_storage_call() {
    let storage = Arc::new(FakeStorage::default());
    let audience = Arc::new(FakeAudience::returning(1));
    let engine = engine(storage.clone(), audience.clone(), Arc::new(FakeStore::default()));

    let limit = test_policy().max_attachments;
    let attachments: Vec<AssetPayload> = (0..limit + 1)
        .map(|i| AssetPayload::new(format!("anexo-{}.png", i), "image/png", vec![0u8; 8]))
        .collect();

    let err = engine.submit(draft(attachments)).await.unwrap_err();
    assert!(matches!(err, DispatchError::Validation { .. }));
    assert!(storage.calls().is_empty());
    assert_eq!(audience.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn preview_accepts_attachment_only_draft() {
    let storage = Arc::new(FakeStorage::default());
    let audience = Arc::new(FakeAudience::returning(42));
    let engine = engine(storage.clone(), audience.clone(), Arc::new(FakeStore::default()));

    let meta = AssetMeta {
        filename: "panfleto.pdf".to_string(),
        content_type: "application/pdf".to_string(),
        size_bytes: 2_000,
    };
    let count = engine
        .preview(&company(), "", &FilterSet::new(vec![]), &[meta])
        .await
        .unwrap();

    assert_eq!(count, 42);
    assert_eq!(audience.calls.load(Ordering::SeqCst), 1);
    assert!(storage.calls().is_empty(), "preview never uploads");
}

#[tokio::test]
async fn preview_rejects_oversize_metadata_before_audience_lookup() {
    let audience = Arc::new(FakeAudience::returning(1));
    let engine = engine(
        Arc::new(FakeStorage::default()),
        audience.clone(),
        Arc::new(FakeStore::default()),
    );

    let meta = AssetMeta {
        filename: "huge.mp4".to_string(),
        content_type: "video/mp4".to_string(),
        size_bytes: 20_000,
    };
    let err = engine
        .preview(&company(), "mensagem", &FilterSet::new(vec![]), &[meta])
        .await
        .unwrap_err();

    match err {
        DispatchError::Validation { failures, .. } => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].filename, "huge.mp4");
        }
        other => panic!("expected validation failure, got {:?}", other),
    }
    assert_eq!(audience.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn filter_options_lists_distinct_values_per_dimension() {
    let engine = engine(
        Arc::new(FakeStorage::default()),
        Arc::new(FakeAudience::returning(1)),
        Arc::new(FakeStore::default()),
    );

    let options = engine.filter_options(Uuid::new_v4()).await.unwrap();
    assert_eq!(options.cities, vec!["Fortaleza", "Natal"]);
    assert_eq!(options.neighborhoods, vec!["Aldeota"]);
    assert_eq!(options.categories, vec!["Apoiador"]);
    assert_eq!(options.genders, vec!["F", "M"]);
}

#[tokio::test]
async fn filter_options_failure_maps_to_audience_error() {
    let audience = Arc::new(FakeAudience {
        count: 0,
        calls: AtomicUsize::new(0),
        fail: true,
    });
    let engine = engine(
        Arc::new(FakeStorage::default()),
        audience,
        Arc::new(FakeStore::default()),
    );

    let err = engine.filter_options(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, DispatchError::Audience(_)));
}

#[tokio::test]
async fn audience_source_failure_maps_to_audience_error() {
    let audience = Arc::new(FakeAudience {
        count: 0,
        calls: AtomicUsize::new(0),
        fail: true,
    });
    let engine = engine(
        Arc::new(FakeStorage::default()),
        audience,
        Arc::new(FakeStore::default()),
    );

    let err = engine.submit(draft(vec![])).await.unwrap_err();
    assert!(matches!(err, DispatchError::Audience(_)));
}

#[tokio::test]
async fn company_without_usable_name_is_configuration_error() {
    let storage = Arc::new(FakeStorage::default());
    let audience = Arc::new(FakeAudience::returning(1));
    let engine = engine(storage.clone(), audience.clone(), Arc::new(FakeStore::default()));

    let mut d = draft(vec![]);
    d.company.name = "!!!".to_string();

    let err = engine.submit(d).await.unwrap_err();
    assert!(matches!(err, DispatchError::Configuration(_)));
    assert_eq!(audience.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn empty_draft_is_rejected() {
    let engine = engine(
        Arc::new(FakeStorage::default()),
        Arc::new(FakeAudience::returning(1)),
        Arc::new(FakeStore::default()),
    );

    let mut d = draft(vec![]);
    d.message = "   ".to_string();

    let err = engine.submit(d).await.unwrap_err();
    assert!(matches!(err, DispatchError::Validation { .. }));
}
