//! End-to-end engine scenarios over a counting mock transport.
//!
//! The node tree runs against recorded JSON fixtures; assertions count
//! remote calls to pin the caching behavior: readdir primes lookup,
//! fresh caches answer without round trips, expired caches re-fetch, and
//! materialization writes the content cache with the remote mtime.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;

use gsfs_core::config::{Include, IncludeDomains, IncludeDrive, IncludeUsers};
use gsfs_core::{CacheConfig, FsError};
use gsfs_fuse::node::{EntryKind, Node, RootNode};
use gsfs_fuse::FsConfig;
use gsfs_remote::{
    ClientProvider, HttpTransport, Request, Response, RetryTransport, TransportError,
};

const MODIFIED_TIME: &str = "2024-05-01T10:30:00Z";
const CREATED_TIME: &str = "2024-04-01T08:00:00Z";

// ── Mock transport ────────────────────────────────────────────────────────

struct Route {
    path: String,
    query: Vec<(String, String)>,
    responses: Mutex<Vec<(StatusCode, String)>>,
}

#[derive(Default)]
struct MockTransport {
    routes: Mutex<Vec<Arc<Route>>>,
    log: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl MockTransport {
    fn new() -> Arc<Self> {
        Arc::new(MockTransport::default())
    }

    fn route(&self, path: &str, query: &[(&str, &str)], status: StatusCode, body: &str) {
        self.route_seq(path, query, vec![(status, body)]);
    }

    fn route_seq(&self, path: &str, query: &[(&str, &str)], responses: Vec<(StatusCode, &str)>) {
        self.routes.lock().unwrap().push(Arc::new(Route {
            path: path.to_string(),
            query: query
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            responses: Mutex::new(
                responses
                    .into_iter()
                    .map(|(status, body)| (status, body.to_string()))
                    .collect(),
            ),
        }));
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn calls_to(&self, fragment: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|line| line.contains(fragment))
            .count()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn execute(&self, req: Request) -> Result<Response, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let pairs: Vec<(String, String)> = req
            .url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        let line = format!(
            "{} {}",
            req.url.path(),
            pairs
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("&")
        );
        self.log.lock().unwrap().push(line);

        let routes = self.routes.lock().unwrap().clone();
        for route in routes {
            let path_matches = req.url.path() == route.path;
            let query_matches = route
                .query
                .iter()
                .all(|expected| pairs.iter().any(|pair| pair == expected));
            if path_matches && query_matches {
                let mut responses = route.responses.lock().unwrap();
                let (status, body) = if responses.len() > 1 {
                    responses.remove(0)
                } else {
                    responses[0].clone()
                };
                return Ok(Response::from_bytes(status, body));
            }
        }
        Ok(Response::from_bytes(StatusCode::NOT_FOUND, "{}"))
    }
}

struct SharedTransport(Arc<MockTransport>);

#[async_trait]
impl HttpTransport for SharedTransport {
    async fn execute(&self, req: Request) -> Result<Response, TransportError> {
        self.0.execute(req).await
    }
}

struct MockProvider {
    transport: Arc<MockTransport>,
    retry: Option<(u32, Duration)>,
    subjects: Mutex<Vec<String>>,
}

impl MockProvider {
    fn new(transport: Arc<MockTransport>) -> Arc<Self> {
        Arc::new(MockProvider {
            transport,
            retry: None,
            subjects: Mutex::new(Vec::new()),
        })
    }

    fn with_retry(transport: Arc<MockTransport>, max_attempts: u32, min_sleep: Duration) -> Arc<Self> {
        Arc::new(MockProvider {
            transport,
            retry: Some((max_attempts, min_sleep)),
            subjects: Mutex::new(Vec::new()),
        })
    }

    fn subjects(&self) -> Vec<String> {
        self.subjects.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClientProvider for MockProvider {
    async fn client(&self, subject: &str) -> Result<Arc<dyn HttpTransport>, TransportError> {
        self.subjects.lock().unwrap().push(subject.to_string());
        match self.retry {
            Some((max_attempts, min_sleep)) => Ok(Arc::new(RetryTransport::new(
                SharedTransport(Arc::clone(&self.transport)),
                max_attempts,
                min_sleep,
            ))),
            None => Ok(Arc::clone(&self.transport) as Arc<dyn HttpTransport>),
        }
    }
}

// ── Fixtures and tree helpers ─────────────────────────────────────────────

fn personal_include() -> Include {
    Include {
        domains: Some(IncludeDomains {
            users: Some(IncludeUsers {
                personal_drive: Some(IncludeDrive {
                    active: true,
                    trashed: false,
                }),
                shared_files: false,
                gmail: false,
            }),
            groups: None,
        }),
        shared_drives: None,
    }
}

fn shared_drives_include() -> Include {
    Include {
        domains: None,
        shared_drives: Some(IncludeDrive {
            active: true,
            trashed: false,
        }),
    }
}

fn fs_config(
    provider: Arc<MockProvider>,
    cache_dir: &Path,
    expiration: Duration,
    include: Include,
) -> FsConfig {
    FsConfig {
        cache: CacheConfig {
            path: cache_dir.to_path_buf(),
            expiration,
        },
        administrator_subject: "admin@acme.com".into(),
        include,
        provider,
    }
}

fn take_child(children: Vec<(String, Node)>, name: &str) -> Node {
    children
        .into_iter()
        .find(|(child_name, _)| child_name == name)
        .unwrap_or_else(|| panic!("missing child {name}"))
        .1
}

fn domain_fixtures(transport: &MockTransport) {
    transport.route(
        "/admin/directory/v1/customer/my_customer/domains",
        &[],
        StatusCode::OK,
        r#"{"domains": [{"domainName": "acme.com"}]}"#,
    );
    transport.route(
        "/admin/directory/v1/users",
        &[("domain", "acme.com")],
        StatusCode::OK,
        r#"{"users": [{"primaryEmail": "a@acme.com"}]}"#,
    );
    transport.route(
        "/admin/directory/v1/customer/my_customer/domains/acme.com",
        &[],
        StatusCode::OK,
        r#"{"domainName": "acme.com"}"#,
    );
    transport.route(
        "/admin/directory/v1/users/a@acme.com",
        &[],
        StatusCode::OK,
        r#"{"primaryEmail": "a@acme.com"}"#,
    );
}

fn drive_file_json(id: &str, name: &str, mime: &str, size: u64) -> String {
    format!(
        r#"{{"id": "{id}", "name": "{name}", "mimeType": "{mime}", "size": "{size}",
            "modifiedTime": "{MODIFIED_TIME}", "createdTime": "{CREATED_TIME}"}}"#
    )
}

/// Walks domains/acme.com/users/a@acme.com/personal-drive/active.
async fn active_drive_node(config: FsConfig) -> Node {
    let root = Node::Root(RootNode::new(config).unwrap());
    let domains = take_child(root.on_add(), "domains");
    let domain = domains.lookup("acme.com").await.unwrap().unwrap();
    let users = take_child(domain.on_add(), "users");
    let user = users.lookup("a@acme.com").await.unwrap().unwrap();
    let personal_drive = take_child(user.on_add(), "personal-drive");
    take_child(personal_drive.on_add(), "active")
}

fn remote_mtime() -> SystemTime {
    DateTime::parse_from_rfc3339(MODIFIED_TIME)
        .unwrap()
        .with_timezone(&Utc)
        .into()
}

// ── Scenarios ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn empty_personal_drive_tree() {
    let transport = MockTransport::new();
    domain_fixtures(&transport);
    transport.route(
        "/drive/v3/files",
        &[("q", "trashed=false and 'root' in parents")],
        StatusCode::OK,
        r#"{"files": []}"#,
    );

    let cache = tempfile::tempdir().unwrap();
    let provider = MockProvider::new(Arc::clone(&transport));
    let config = fs_config(
        Arc::clone(&provider),
        cache.path(),
        Duration::from_secs(60),
        personal_include(),
    );

    let root = Node::Root(RootNode::new(config).unwrap());
    let domains = take_child(root.on_add(), "domains");

    let domain_entries = domains.readdir().await.unwrap().unwrap();
    assert_eq!(domain_entries.len(), 1);
    assert_eq!(domain_entries[0].name, "acme.com");
    assert_eq!(domain_entries[0].kind, EntryKind::Directory);

    // Primed by the readdir above: no remote call.
    let domain = domains.lookup("acme.com").await.unwrap().unwrap();
    let users = take_child(domain.on_add(), "users");

    let user_entries = users.readdir().await.unwrap().unwrap();
    assert_eq!(user_entries.len(), 1);
    assert_eq!(user_entries[0].name, "a@acme.com");

    let user = users.lookup("a@acme.com").await.unwrap().unwrap();
    let personal_drive = take_child(user.on_add(), "personal-drive");
    let active = take_child(personal_drive.on_add(), "active");

    let files = active.readdir().await.unwrap().unwrap();
    assert!(files.is_empty());

    // domains.list, users.list, files.list
    assert_eq!(transport.calls(), 3);
}

#[tokio::test]
async fn readdir_primes_lookup_and_open_materializes() {
    let transport = MockTransport::new();
    domain_fixtures(&transport);
    let listing = format!(
        r#"{{"files": [{}, {}]}}"#,
        drive_file_json("doc-1", "Doc", "application/vnd.google-apps.folder", 0),
        drive_file_json("note-1", "Note.txt", "text/plain", 10),
    );
    transport.route(
        "/drive/v3/files",
        &[("q", "trashed=false and 'root' in parents")],
        StatusCode::OK,
        &listing,
    );
    transport.route(
        "/drive/v3/files/note-1",
        &[("alt", "media")],
        StatusCode::OK,
        "note body!",
    );

    let cache = tempfile::tempdir().unwrap();
    let provider = MockProvider::new(Arc::clone(&transport));
    let config = fs_config(
        Arc::clone(&provider),
        cache.path(),
        Duration::from_secs(60),
        personal_include(),
    );
    let active = active_drive_node(config).await;

    let entries = active.readdir().await.unwrap().unwrap();
    assert_eq!(
        entries
            .iter()
            .map(|e| (e.name.as_str(), e.kind))
            .collect::<Vec<_>>(),
        vec![
            ("Doc", EntryKind::Directory),
            ("Note.txt", EntryKind::RegularFile)
        ]
    );

    // Both lookups are served from the cache the readdir primed.
    let before = transport.calls();
    let doc = active.lookup("Doc").await.unwrap().unwrap();
    assert!(matches!(doc, Node::Directory(_)));
    let note = active.lookup("Note.txt").await.unwrap().unwrap();
    assert!(matches!(note, Node::File(_)));
    assert_eq!(transport.calls(), before);

    let handle = note.open(0).await.unwrap().unwrap();
    assert_eq!(
        handle.read_at(0, 64).unwrap(),
        Bytes::from_static(b"note body!")
    );

    let cached = cache.path().join("note-1");
    assert_eq!(std::fs::read(&cached).unwrap(), b"note body!");
    assert_eq!(
        std::fs::metadata(&cached).unwrap().modified().unwrap(),
        remote_mtime()
    );
    assert_eq!(transport.calls_to("/drive/v3/files/note-1"), 1);

    // Fresh cache copy: a second open downloads nothing.
    let handle = note.open(0).await.unwrap().unwrap();
    assert_eq!(
        handle.read_at(0, 64).unwrap(),
        Bytes::from_static(b"note body!")
    );
    assert_eq!(transport.calls_to("/drive/v3/files/note-1"), 1);

    // Drive queries ran as the drive's owner.
    assert!(provider.subjects().contains(&"a@acme.com".to_string()));
}

#[tokio::test]
async fn expired_readdir_cache_refetches() {
    let transport = MockTransport::new();
    domain_fixtures(&transport);
    transport.route(
        "/drive/v3/files",
        &[("q", "trashed=false and 'root' in parents")],
        StatusCode::OK,
        r#"{"files": []}"#,
    );

    let cache = tempfile::tempdir().unwrap();
    let provider = MockProvider::new(Arc::clone(&transport));
    let config = fs_config(
        Arc::clone(&provider),
        cache.path(),
        Duration::from_millis(50),
        personal_include(),
    );
    let active = active_drive_node(config).await;

    active.readdir().await.unwrap();
    active.readdir().await.unwrap();
    assert_eq!(transport.calls_to("/drive/v3/files"), 1);

    tokio::time::sleep(Duration::from_millis(80)).await;
    active.readdir().await.unwrap();
    assert_eq!(transport.calls_to("/drive/v3/files"), 2);
}

#[tokio::test]
async fn native_documents_export_office_formats() {
    let transport = MockTransport::new();
    domain_fixtures(&transport);
    let docx_mime = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
    let report = format!(
        r#"{{"files": [{{"id": "gdoc-1", "name": "Report",
            "mimeType": "application/vnd.google-apps.document",
            "modifiedTime": "{MODIFIED_TIME}", "createdTime": "{CREATED_TIME}",
            "exportLinks": {{
                "application/pdf": "https://example.com/pdf",
                "{docx_mime}": "https://example.com/docx"
            }}}}]}}"#
    );
    transport.route(
        "/drive/v3/files",
        &[(
            "q",
            "trashed=false and 'root' in parents and name = 'Report'",
        )],
        StatusCode::OK,
        &report,
    );
    transport.route(
        "/drive/v3/files/gdoc-1/export",
        &[("mimeType", docx_mime)],
        StatusCode::OK,
        "exported docx bytes",
    );

    let cache = tempfile::tempdir().unwrap();
    let provider = MockProvider::new(Arc::clone(&transport));
    let config = fs_config(
        Arc::clone(&provider),
        cache.path(),
        Duration::from_secs(60),
        personal_include(),
    );
    let active = active_drive_node(config).await;

    let report = active.lookup("Report").await.unwrap().unwrap();
    report.open(0).await.unwrap().unwrap();

    assert_eq!(transport.calls_to("/drive/v3/files/gdoc-1/export"), 1);
    assert_eq!(transport.calls_to("mimeType=application/pdf"), 0);
    assert_eq!(
        std::fs::read(cache.path().join("gdoc-1")).unwrap(),
        b"exported docx bytes"
    );
}

#[tokio::test]
async fn download_retries_through_rate_limits() {
    let transport = MockTransport::new();
    domain_fixtures(&transport);
    transport.route(
        "/drive/v3/files",
        &[(
            "q",
            "trashed=false and 'root' in parents and name = 'big.bin'",
        )],
        StatusCode::OK,
        &format!(
            r#"{{"files": [{}]}}"#,
            drive_file_json("big-1", "big.bin", "application/octet-stream", 8)
        ),
    );
    transport.route_seq(
        "/drive/v3/files/big-1",
        &[("alt", "media")],
        vec![
            (StatusCode::TOO_MANY_REQUESTS, ""),
            (StatusCode::TOO_MANY_REQUESTS, ""),
            (StatusCode::TOO_MANY_REQUESTS, ""),
            (StatusCode::OK, "big body"),
        ],
    );

    let cache = tempfile::tempdir().unwrap();
    let provider =
        MockProvider::with_retry(Arc::clone(&transport), 5, Duration::from_millis(1));
    let config = fs_config(
        Arc::clone(&provider),
        cache.path(),
        Duration::from_secs(60),
        personal_include(),
    );
    let active = active_drive_node(config).await;

    let file = active.lookup("big.bin").await.unwrap().unwrap();
    file.open(0).await.unwrap().unwrap();

    assert_eq!(transport.calls_to("/drive/v3/files/big-1"), 4);
    assert_eq!(std::fs::read(cache.path().join("big-1")).unwrap(), b"big body");
}

#[tokio::test]
async fn shared_drive_lookup_short_circuits_pagination() {
    let transport = MockTransport::new();
    transport.route(
        "/drive/v3/drives",
        &[("pageToken", "p2")],
        StatusCode::OK,
        r#"{"drives": [{"id": "d3", "name": "Later"}]}"#,
    );
    transport.route(
        "/drive/v3/drives",
        &[],
        StatusCode::OK,
        r#"{"drives": [{"id": "d1", "name": "Target"}, {"id": "d2", "name": "Other"}],
           "nextPageToken": "p2"}"#,
    );

    let cache = tempfile::tempdir().unwrap();
    let provider = MockProvider::new(Arc::clone(&transport));
    let config = fs_config(
        Arc::clone(&provider),
        cache.path(),
        Duration::from_secs(60),
        shared_drives_include(),
    );

    let root = Node::Root(RootNode::new(config).unwrap());
    let shared_drives = take_child(root.on_add(), "shared-drives");

    let drive = shared_drives.lookup("Target").await.unwrap().unwrap();
    assert!(matches!(drive, Node::SharedDrive(_)));
    // Matched on the first page; the second was never fetched.
    assert_eq!(transport.calls_to("/drive/v3/drives"), 1);

    let active = take_child(drive.on_add(), "active");
    transport.route(
        "/drive/v3/files",
        &[
            ("corpora", "drive"),
            ("driveId", "d1"),
            ("q", "trashed=false and 'd1' in parents"),
        ],
        StatusCode::OK,
        r#"{"files": []}"#,
    );
    assert!(active.readdir().await.unwrap().unwrap().is_empty());

    // Directory-wide queries run as the administrator.
    assert!(provider
        .subjects()
        .iter()
        .all(|subject| subject == "admin@acme.com"));
}

#[tokio::test]
async fn ignored_names_never_reach_the_remote() {
    let transport = MockTransport::new();
    let cache = tempfile::tempdir().unwrap();
    let provider = MockProvider::new(Arc::clone(&transport));
    let config = fs_config(
        Arc::clone(&provider),
        cache.path(),
        Duration::from_secs(60),
        personal_include(),
    );

    let root = Node::Root(RootNode::new(config).unwrap());
    let domains = take_child(root.on_add(), "domains");

    for name in [".git", "HEAD"] {
        let err = domains.lookup(name).await.unwrap_err();
        assert!(matches!(err, FsError::NotFound));
    }
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn missing_entries_map_to_not_found() {
    let transport = MockTransport::new();
    domain_fixtures(&transport);
    transport.route(
        "/drive/v3/files",
        &[(
            "q",
            "trashed=false and 'root' in parents and name = 'absent.txt'",
        )],
        StatusCode::OK,
        r#"{"files": []}"#,
    );

    let cache = tempfile::tempdir().unwrap();
    let provider = MockProvider::new(Arc::clone(&transport));
    let config = fs_config(
        Arc::clone(&provider),
        cache.path(),
        Duration::from_secs(60),
        personal_include(),
    );
    let active = active_drive_node(config).await;

    let err = active.lookup("absent.txt").await.unwrap_err();
    assert!(matches!(err, FsError::NotFound));
}
