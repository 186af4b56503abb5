//! Data loading for views.
//!
//! Views with a data source fetch their payload through a [`Loader`] before rendering. Every
//! loader checks connectivity first and reports [`LoadError::Offline`] without attempting the
//! request.

use crate::error::LoadError;
use futures::future::{self, FutureExt, LocalBoxFuture};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Extra request parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Query parameters appended to the request.
    pub query: BTreeMap<String, String>,
}

/// Network-load collaborator.
pub trait Loader {
    /// Fetch and decode the resource at `url`.
    fn load(&self, url: &str, options: &LoadOptions) -> LocalBoxFuture<'static, Result<Value, LoadError>>;
}

// ===== StaticLoader =====

/// Canned response for a [`StaticLoader`] locator.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Data(Value),
    Status(u16),
    Timeout,
}

/// In-memory loader with switchable connectivity. Records every attempted request.
#[derive(Debug)]
pub struct StaticLoader {
    online: Cell<bool>,
    responses: RefCell<HashMap<String, Response>>,
    requests: RefCell<Vec<String>>,
}

impl Default for StaticLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticLoader {
    pub fn new() -> Self {
        Self {
            online: Cell::new(true),
            responses: RefCell::new(HashMap::new()),
            requests: RefCell::new(Vec::new()),
        }
    }

    /// Serve `data` for `url`.
    pub fn insert(&self, url: impl Into<String>, data: Value) {
        self.responses
            .borrow_mut()
            .insert(url.into(), Response::Data(data));
    }

    pub fn respond(&self, url: impl Into<String>, response: Response) {
        self.responses.borrow_mut().insert(url.into(), response);
    }

    pub fn set_online(&self, online: bool) {
        self.online.set(online);
    }

    /// Requests that reached the (simulated) network, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }

    /// Number of attempted requests for `url`.
    pub fn request_count(&self, url: &str) -> usize {
        self.requests.borrow().iter().filter(|r| *r == url).count()
    }
}

impl Loader for StaticLoader {
    fn load(&self, url: &str, _options: &LoadOptions) -> LocalBoxFuture<'static, Result<Value, LoadError>> {
        if !self.online.get() {
            return future::ready(Err(LoadError::Offline {
                url: url.to_string(),
            }))
            .boxed_local();
        }

        self.requests.borrow_mut().push(url.to_string());
        let result = match self.responses.borrow().get(url) {
            Some(Response::Data(data)) => Ok(data.clone()),
            Some(Response::Status(status)) => Err(LoadError::Status {
                url: url.to_string(),
                status: *status,
            }),
            Some(Response::Timeout) => Err(LoadError::Timeout {
                url: url.to_string(),
            }),
            None => Err(LoadError::Status {
                url: url.to_string(),
                status: 404,
            }),
        };
        debug!(url, ok = result.is_ok(), "static load");
        future::ready(result).boxed_local()
    }
}

// ===== DirLoader =====

/// Loads `<root>/<url>.json` from disk.
#[derive(Debug, Clone)]
pub struct DirLoader {
    root: PathBuf,
    online: bool,
}

impl DirLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            online: true,
        }
    }

    /// Simulate lost connectivity.
    pub fn offline(mut self) -> Self {
        self.online = false;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, url: &str) -> PathBuf {
        let relative = url.trim_start_matches('/');
        let mut path = self.root.join(relative);
        if path.extension().is_none() {
            path.set_extension("json");
        }
        path
    }
}

impl Loader for DirLoader {
    fn load(&self, url: &str, _options: &LoadOptions) -> LocalBoxFuture<'static, Result<Value, LoadError>> {
        if !self.online {
            return future::ready(Err(LoadError::Offline {
                url: url.to_string(),
            }))
            .boxed_local();
        }

        let path = self.path_for(url);
        let result = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| LoadError::Decode {
                url: url.to_string(),
                reason: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(LoadError::Status {
                url: url.to_string(),
                status: 404,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => Err(LoadError::Status {
                url: url.to_string(),
                status: 403,
            }),
            Err(e) => Err(LoadError::Decode {
                url: url.to_string(),
                reason: e.to_string(),
            }),
        };
        debug!(url, path = ?path, ok = result.is_ok(), "directory load");
        future::ready(result).boxed_local()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use serde_json::json;
    use std::fs;

    #[test]
    fn static_loader_serves_inserted_data() {
        let loader = StaticLoader::new();
        loader.insert("widgets/button", json!({"title": "Button"}));

        let result = block_on(loader.load("widgets/button", &LoadOptions::default()));

        assert_eq!(result, Ok(json!({"title": "Button"})));
        assert_eq!(loader.request_count("widgets/button"), 1);
    }

    #[test]
    fn static_loader_reports_offline_before_requesting() {
        let loader = StaticLoader::new();
        loader.insert("a", json!(1));
        loader.set_online(false);

        let result = block_on(loader.load("a", &LoadOptions::default()));

        assert_eq!(
            result,
            Err(LoadError::Offline {
                url: "a".to_string()
            })
        );
        assert!(loader.requests().is_empty(), "offline must not reach the network");
    }

    #[test]
    fn static_loader_unknown_url_is_404() {
        let loader = StaticLoader::new();
        let result = block_on(loader.load("nope", &LoadOptions::default()));
        assert!(matches!(result, Err(LoadError::Status { status: 404, .. })));
    }

    #[test]
    fn static_loader_canned_failures() {
        let loader = StaticLoader::new();
        loader.respond("slow", Response::Timeout);
        loader.respond("forbidden", Response::Status(403));

        assert!(matches!(
            block_on(loader.load("slow", &LoadOptions::default())),
            Err(LoadError::Timeout { .. })
        ));
        assert!(matches!(
            block_on(loader.load("forbidden", &LoadOptions::default())),
            Err(LoadError::Status { status: 403, .. })
        ));
    }

    #[test]
    fn dir_loader_reads_json_files() {
        let dir = std::env::temp_dir().join("viewkit_dir_loader_reads");
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(dir.join("widgets")).expect("create dir");
        fs::write(dir.join("widgets/slider.json"), r#"{"title": "Slider"}"#).expect("write");

        let loader = DirLoader::new(&dir);
        let result = block_on(loader.load("/widgets/slider", &LoadOptions::default()));

        assert_eq!(result, Ok(json!({"title": "Slider"})));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn dir_loader_missing_file_is_404_and_bad_json_is_decode_error() {
        let dir = std::env::temp_dir().join("viewkit_dir_loader_errors");
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).expect("create dir");
        fs::write(dir.join("broken.json"), "{ not json").expect("write");

        let loader = DirLoader::new(&dir);
        assert!(matches!(
            block_on(loader.load("missing", &LoadOptions::default())),
            Err(LoadError::Status { status: 404, .. })
        ));
        assert!(matches!(
            block_on(loader.load("broken", &LoadOptions::default())),
            Err(LoadError::Decode { .. })
        ));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn dir_loader_offline_short_circuits() {
        let loader = DirLoader::new("/definitely/not/here").offline();
        assert!(matches!(
            block_on(loader.load("x", &LoadOptions::default())),
            Err(LoadError::Offline { .. })
        ));
    }
}
