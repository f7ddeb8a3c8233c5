use crate::backend::{
    Backend, BackendAttrs, BackendFailure, BackendResult, Capabilities, HandleToken,
};
use crate::metadata::NodeKind;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

#[derive(Debug, Clone, Copy)]
struct Times {
    atime: i64,
    mtime: i64,
    ctime: i64,
    birthtime: i64,
}

impl Times {
    fn new(now: i64) -> Self {
        Self {
            atime: now,
            mtime: now,
            ctime: now,
            birthtime: now,
        }
    }
}

#[derive(Debug, Clone)]
enum MemNode {
    File { data: Vec<u8>, times: Times },
    Directory { times: Times },
    Symlink { target: String, times: Times },
}

impl MemNode {
    fn attrs(&self) -> BackendAttrs {
        let (kind, size, times) = match self {
            MemNode::File { data, times } => (NodeKind::File, Some(data.len() as u64), *times),
            MemNode::Directory { times } => (NodeKind::Directory, None, *times),
            MemNode::Symlink { target, times } => {
                (NodeKind::Symlink, Some(target.len() as u64), *times)
            }
        };
        BackendAttrs {
            kind,
            size,
            atime: times.atime,
            mtime: times.mtime,
            ctime: times.ctime,
            birthtime: times.birthtime,
        }
    }
}

/// Keys in backend form; the root lives at the empty key.
struct State {
    nodes: BTreeMap<String, MemNode>,
}

impl Default for State {
    fn default() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            String::new(),
            MemNode::Directory {
                times: Times::new(now_millis()),
            },
        );
        Self { nodes }
    }
}

/// In-memory [`Backend`] over a flat key map.
#[derive(Clone)]
pub struct MemoryBackend(Arc<Mutex<State>>);

impl Default for MemoryBackend {
    fn default() -> Self {
        Self(Arc::new(Mutex::new(State::default())))
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

fn absent(key: &str) -> BackendFailure {
    BackendFailure::coded("ENOENT", format!("/{}", key))
}

fn parent_of(key: &str) -> &str {
    match key.rfind('/') {
        Some(idx) => &key[..idx],
        None => "",
    }
}

impl State {
    fn require_parent_dir(&self, key: &str) -> BackendResult<()> {
        let parent = parent_of(key);
        match self.nodes.get(parent) {
            Some(MemNode::Directory { .. }) => Ok(()),
            Some(_) => Err(BackendFailure::coded("ENOTDIR", format!("/{}", parent))),
            None => Err(absent(parent)),
        }
    }

    fn child_names(&self, key: &str) -> Vec<String> {
        let prefix = if key.is_empty() {
            String::new()
        } else {
            format!("{}/", key)
        };
        self.nodes
            .keys()
            .filter(|k| !k.is_empty() && k.starts_with(&prefix))
            .filter_map(|k| {
                let rest = &k[prefix.len()..];
                if rest.is_empty() || rest.contains('/') {
                    None
                } else {
                    Some(rest.to_string())
                }
            })
            .collect()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            symlinks: true,
            times: true,
            buffering: false,
        }
    }

    async fn probe(&self, key: &str) -> BackendResult<BackendAttrs> {
        let state = self.0.lock().await;
        state
            .nodes
            .get(key)
            .map(|node| node.attrs())
            .ok_or_else(|| absent(key))
    }

    async fn create(&self, key: &str) -> BackendResult<HandleToken> {
        let mut state = self.0.lock().await;
        if state.nodes.contains_key(key) {
            return Err(BackendFailure::coded("EEXIST", format!("/{}", key)));
        }
        state.require_parent_dir(key)?;
        state.nodes.insert(
            key.to_string(),
            MemNode::File {
                data: Vec::new(),
                times: Times::new(now_millis()),
            },
        );
        Ok(HandleToken::Key(key.to_string()))
    }

    async fn remove(&self, key: &str) -> BackendResult<()> {
        let mut state = self.0.lock().await;
        match state.nodes.get(key) {
            None => Err(absent(key)),
            Some(MemNode::Directory { .. }) => {
                Err(BackendFailure::coded("EISDIR", format!("/{}", key)))
            }
            Some(_) => {
                state.nodes.remove(key);
                Ok(())
            }
        }
    }

    async fn make_directory(&self, key: &str) -> BackendResult<()> {
        let mut state = self.0.lock().await;
        if state.nodes.contains_key(key) {
            return Err(BackendFailure::coded("EEXIST", format!("/{}", key)));
        }
        state.require_parent_dir(key)?;
        state.nodes.insert(
            key.to_string(),
            MemNode::Directory {
                times: Times::new(now_millis()),
            },
        );
        Ok(())
    }

    async fn remove_directory(&self, key: &str) -> BackendResult<()> {
        let mut state = self.0.lock().await;
        if key.is_empty() {
            // The root is not removable.
            return Err(BackendFailure::code("EBUSY"));
        }
        match state.nodes.get(key) {
            None => Err(absent(key)),
            Some(MemNode::Directory { .. }) => {
                if !state.child_names(key).is_empty() {
                    return Err(BackendFailure::coded("ENOTEMPTY", format!("/{}", key)));
                }
                state.nodes.remove(key);
                Ok(())
            }
            Some(_) => Err(BackendFailure::coded("ENOTDIR", format!("/{}", key))),
        }
    }

    async fn list(&self, key: &str) -> BackendResult<Vec<String>> {
        let state = self.0.lock().await;
        match state.nodes.get(key) {
            None => Err(absent(key)),
            Some(MemNode::Directory { .. }) => Ok(state.child_names(key)),
            Some(_) => Err(BackendFailure::coded("ENOTDIR", format!("/{}", key))),
        }
    }

    async fn rename(&self, old_key: &str, new_key: &str) -> BackendResult<()> {
        let mut state = self.0.lock().await;
        if !state.nodes.contains_key(old_key) {
            return Err(absent(old_key));
        }
        // The root cannot move, and a node cannot move under itself.
        if old_key.is_empty() || new_key.starts_with(&format!("{}/", old_key)) {
            return Err(BackendFailure::coded("EINVAL", format!("/{}", new_key)));
        }
        if state.nodes.contains_key(new_key) {
            return Err(BackendFailure::coded("EEXIST", format!("/{}", new_key)));
        }
        state.require_parent_dir(new_key)?;
        // Move the node and, for directories, everything under it.
        let old_prefix = format!("{}/", old_key);
        let moved: Vec<String> = state
            .nodes
            .keys()
            .filter(|k| *k == old_key || k.starts_with(&old_prefix))
            .cloned()
            .collect();
        for from in moved {
            if let Some(node) = state.nodes.remove(&from) {
                let to = format!("{}{}", new_key, &from[old_key.len()..]);
                state.nodes.insert(to, node);
            }
        }
        Ok(())
    }

    async fn read(&self, token: &HandleToken, offset: u64, length: u64) -> BackendResult<Vec<u8>> {
        let key = match token {
            HandleToken::Key(key) => key,
            HandleToken::Remote(_) => return Err(BackendFailure::code("EBADF")),
        };
        let state = self.0.lock().await;
        match state.nodes.get(key.as_str()) {
            None => Err(absent(key)),
            Some(MemNode::Directory { .. }) => {
                Err(BackendFailure::coded("EISDIR", format!("/{}", key)))
            }
            Some(MemNode::Symlink { .. }) => {
                Err(BackendFailure::coded("EINVAL", format!("/{}", key)))
            }
            Some(MemNode::File { data, .. }) => {
                let start = (offset as usize).min(data.len());
                let end = start.saturating_add(length as usize).min(data.len());
                Ok(data[start..end].to_vec())
            }
        }
    }

    async fn write(&self, token: &HandleToken, data: &[u8], offset: u64) -> BackendResult<u64> {
        let key = match token {
            HandleToken::Key(key) => key.clone(),
            HandleToken::Remote(_) => return Err(BackendFailure::code("EBADF")),
        };
        let mut state = self.0.lock().await;
        match state.nodes.get_mut(key.as_str()) {
            None => Err(absent(&key)),
            Some(MemNode::File { data: content, times }) => {
                let offset = offset as usize;
                if content.len() < offset {
                    content.resize(offset, 0);
                }
                let overlap = (content.len() - offset).min(data.len());
                content[offset..offset + overlap].copy_from_slice(&data[..overlap]);
                content.extend_from_slice(&data[overlap..]);
                times.mtime = now_millis();
                Ok(data.len() as u64)
            }
            Some(_) => Err(BackendFailure::coded("EISDIR", format!("/{}", key))),
        }
    }

    async fn truncate(&self, key: &str, length: u64) -> BackendResult<()> {
        let mut state = self.0.lock().await;
        match state.nodes.get_mut(key) {
            None => Err(absent(key)),
            Some(MemNode::File { data, times }) => {
                data.resize(length as usize, 0);
                times.mtime = now_millis();
                Ok(())
            }
            Some(_) => Err(BackendFailure::coded("EISDIR", format!("/{}", key))),
        }
    }

    async fn set_times(&self, key: &str, atime: i64, mtime: i64) -> BackendResult<()> {
        let mut state = self.0.lock().await;
        match state.nodes.get_mut(key) {
            None => Err(absent(key)),
            Some(MemNode::File { times, .. })
            | Some(MemNode::Directory { times })
            | Some(MemNode::Symlink { times, .. }) => {
                times.atime = atime;
                times.mtime = mtime;
                Ok(())
            }
        }
    }

    async fn symlink(&self, key: &str, target: &str) -> BackendResult<()> {
        let mut state = self.0.lock().await;
        if state.nodes.contains_key(key) {
            return Err(BackendFailure::coded("EEXIST", format!("/{}", key)));
        }
        state.require_parent_dir(key)?;
        state.nodes.insert(
            key.to_string(),
            MemNode::Symlink {
                target: target.to_string(),
                times: Times::new(now_millis()),
            },
        );
        Ok(())
    }

    async fn read_symlink(&self, key: &str) -> BackendResult<String> {
        let state = self.0.lock().await;
        match state.nodes.get(key) {
            None => Err(absent(key)),
            Some(MemNode::Symlink { target, .. }) => Ok(target.clone()),
            Some(_) => Err(BackendFailure::code("EINVAL")),
        }
    }
}
