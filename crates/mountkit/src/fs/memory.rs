//! In-memory key/value store backend.
//!
//! [`InMemory`] keeps everything in one `HashMap<u64, Vec<u8>>`:
//!
//! - inode records (58-byte [`Inode`] images) under random keys, the root
//!   directory's record under key `0`;
//! - file contents under the owning inode's `ino`;
//! - directory contents as a JSON object mapping entry names to inode keys.
//!
//! Hard links are two listing entries naming the same inode key; the data is
//! released when the record's `nlink` drops to zero.

// RwLock.read()/write().unwrap() only panics on lock poisoning (prior panic
// while holding lock). This is intentional - corrupted state should not propagate.
#![allow(clippy::unwrap_used)]

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::RwLock;

use super::backend::SyncBackend;
use super::traits::{FileData, FileSystemMetadata};
use crate::constants::{PERMISSION_MASK, R_OK, S_IFDIR, S_IFREG, W_OK};
use crate::cred::Credentials;
use crate::error::{Errno, Error, Result};
use crate::flags::OpenFlags;
use crate::inode::{INODE_SIZE, Inode};
use crate::path::{basename, dirname, is_root};
use crate::stats::{Stats, now_ms};

type Key = u64;
type Listing = BTreeMap<String, Key>;
type Store = HashMap<Key, Vec<u8>>;

const ROOT_KEY: Key = 0;

/// In-memory storage backend.
///
/// Wrap in [`Synchronous`](super::Synchronous) to mount it.
///
/// # Example
///
/// ```rust
/// use mountkit::{Credentials, FileSystem, InMemory, Synchronous};
/// use std::path::Path;
///
/// let fs = Synchronous::new(InMemory::with_capacity(1 << 20));
/// let root = Credentials::root();
/// fs.mkdir_sync(Path::new("/tmp"), 0o777, &root)?;
/// assert_eq!(fs.readdir_sync(Path::new("/"), &root)?, vec!["tmp"]);
/// assert!(fs.metadata().free_space < 1 << 20);
/// # Ok::<(), mountkit::Error>(())
/// ```
#[derive(Debug)]
pub struct InMemory {
    store: RwLock<Store>,
    capacity: u64,
}

impl Default for InMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemory {
    /// Empty store with a world-writable root directory and no capacity limit.
    pub fn new() -> Self {
        Self::with_capacity(u64::MAX)
    }

    /// Empty store limited to `capacity` bytes of records and data.
    pub fn with_capacity(capacity: u64) -> Self {
        let mut root = Inode::new();
        root.set_mode((S_IFDIR | 0o777) as u16);
        let mut store = Store::new();
        store.insert(root.ino(), b"{}".to_vec());
        store.insert(ROOT_KEY, root.to_vec());
        Self {
            store: RwLock::new(store),
            capacity,
        }
    }

    /// Bytes currently stored.
    pub fn used_space(&self) -> u64 {
        used(&self.store.read().unwrap())
    }
}

fn used(store: &Store) -> u64 {
    store.values().map(|v| v.len() as u64).sum()
}

fn inode_at(store: &Store, key: Key, path: &Path, syscall: &'static str) -> Result<Inode> {
    let bytes = store
        .get(&key)
        .ok_or_else(|| Error::with(Errno::EIO, path, syscall))?;
    Inode::from_bytes(bytes).map_err(|e| e.at(path).during(syscall))
}

fn listing_of(store: &Store, dir: &Inode, path: &Path, syscall: &'static str) -> Result<Listing> {
    if dir.to_stats().is_directory() {
        let bytes = store
            .get(&dir.ino())
            .ok_or_else(|| Error::with(Errno::EIO, path, syscall))?;
        serde_json::from_slice(bytes).map_err(|e| {
            Error::new(Errno::EIO, format!("corrupt directory listing: {}", e))
                .at(path)
                .during(syscall)
        })
    } else {
        Err(Error::with(Errno::ENOTDIR, path, syscall))
    }
}

fn encode_listing(listing: &Listing) -> Result<Vec<u8>> {
    serde_json::to_vec(listing)
        .map_err(|e| Error::new(Errno::EIO, format!("cannot encode directory listing: {}", e)))
}

/// Walk from the root to `path`, returning the inode key.
fn lookup(store: &Store, path: &Path, syscall: &'static str) -> Result<Key> {
    let mut key = ROOT_KEY;
    for component in path.components().skip(1) {
        let name = component.as_os_str().to_string_lossy();
        let dir = inode_at(store, key, path, syscall)?;
        let listing = listing_of(store, &dir, path, syscall)?;
        key = *listing
            .get(name.as_ref())
            .ok_or_else(|| Error::with(Errno::ENOENT, path, syscall))?;
    }
    Ok(key)
}

/// A resolved parent directory ready for modification.
struct Parent {
    key: Key,
    inode: Inode,
    listing: Listing,
}

impl Parent {
    fn open(
        store: &Store,
        path: &Path,
        cred: &Credentials,
        syscall: &'static str,
    ) -> Result<Self> {
        let dir = dirname(path);
        let key = lookup(store, dir, syscall).map_err(|e| e.at(path))?;
        let inode = inode_at(store, key, dir, syscall)?;
        let listing = listing_of(store, &inode, path, syscall)?;
        if !inode.to_stats().has_access(W_OK, cred) {
            return Err(Error::with(Errno::EACCES, path, syscall));
        }
        Ok(Self {
            key,
            inode,
            listing,
        })
    }

    fn commit(mut self, store: &mut Store) -> Result<()> {
        let now = now_ms();
        self.inode.set_mtime_ms(now);
        self.inode.set_ctime_ms(now);
        store.insert(self.inode.ino(), encode_listing(&self.listing)?);
        store.insert(self.key, self.inode.to_vec());
        Ok(())
    }
}

fn unused_key(store: &Store) -> Key {
    loop {
        let key = rand::random::<u64>();
        if key != ROOT_KEY && !store.contains_key(&key) {
            return key;
        }
    }
}

/// Drop one link to the record at `key`, freeing it on the last one.
fn release(store: &mut Store, key: Key, path: &Path, syscall: &'static str) -> Result<()> {
    let mut inode = inode_at(store, key, path, syscall)?;
    let nlink = inode.nlink().saturating_sub(1);
    if nlink == 0 {
        store.remove(&inode.ino());
        store.remove(&key);
    } else {
        inode.set_nlink(nlink);
        inode.set_ctime_ms(now_ms());
        store.insert(key, inode.to_vec());
    }
    Ok(())
}

impl InMemory {
    fn check_space(&self, store: &Store, grow: u64, path: &Path, syscall: &'static str) -> Result<()> {
        if used(store).saturating_add(grow) > self.capacity {
            return Err(Error::with(Errno::ENOSPC, path, syscall));
        }
        Ok(())
    }

    /// Create a new entry of type and mode `mode` holding `data`.
    fn commit_new(
        &self,
        path: &Path,
        mode: u32,
        data: Vec<u8>,
        cred: &Credentials,
        syscall: &'static str,
    ) -> Result<Inode> {
        let mut store = self.store.write().unwrap();
        if is_root(path) {
            return Err(Error::with(Errno::EEXIST, path, syscall));
        }
        let mut parent = Parent::open(&store, path, cred, syscall)?;
        let name = basename(path);
        if parent.listing.contains_key(name) {
            return Err(Error::with(Errno::EEXIST, path, syscall));
        }
        self.check_space(
            &store,
            (INODE_SIZE + data.len() + name.len() + 24) as u64,
            path,
            syscall,
        )?;

        let mut inode = Inode::new();
        while inode.ino() == ROOT_KEY || store.contains_key(&inode.ino()) {
            inode.set_ino(rand::random::<u64>());
        }
        inode.set_mode(mode as u16);
        inode.set_uid(cred.uid);
        inode.set_gid(cred.gid);
        if mode & S_IFDIR != S_IFDIR {
            inode.set_size(data.len() as u32);
        }
        store.insert(inode.ino(), data);
        let key = unused_key(&store);
        store.insert(key, inode.to_vec());
        parent.listing.insert(name.to_string(), key);
        parent.commit(&mut store)?;
        Ok(inode)
    }
}

impl SyncBackend for InMemory {
    fn metadata(&self) -> FileSystemMetadata {
        let used = self.used_space();
        FileSystemMetadata {
            total_space: self.capacity,
            free_space: self.capacity.saturating_sub(used),
            ..FileSystemMetadata::named("InMemory")
        }
    }

    fn rename(&self, old_path: &Path, new_path: &Path, cred: &Credentials) -> Result<()> {
        const SYSCALL: &str = "rename";
        let mut store = self.store.write().unwrap();

        let old_key = lookup(&store, old_path, SYSCALL)?;
        if old_path == new_path {
            return Ok(());
        }
        if is_root(old_path) || new_path.starts_with(old_path) {
            return Err(Error::with(Errno::EBUSY, old_path, SYSCALL));
        }
        let moving = inode_at(&store, old_key, old_path, SYSCALL)?;

        let mut old_parent = Parent::open(&store, old_path, cred, SYSCALL)?;
        let same_parent = dirname(old_path) == dirname(new_path);
        let mut new_parent = if same_parent {
            None
        } else {
            Some(Parent::open(&store, new_path, cred, SYSCALL)?)
        };

        let old_name = basename(old_path);
        let new_name = basename(new_path).to_string();
        let target_listing = match new_parent.as_ref() {
            Some(p) => &p.listing,
            None => &old_parent.listing,
        };
        if let Some(&existing) = target_listing.get(&new_name) {
            let replaced = inode_at(&store, existing, new_path, SYSCALL)?.to_stats();
            if replaced.is_directory() {
                return Err(Error::with(Errno::EPERM, new_path, SYSCALL));
            }
            if moving.to_stats().is_directory() {
                return Err(Error::with(Errno::ENOTDIR, new_path, SYSCALL));
            }
            // Both names are links to the same inode: nothing to do.
            if existing == old_key {
                return Ok(());
            }
            release(&mut store, existing, new_path, SYSCALL)?;
        }

        old_parent.listing.remove(old_name);
        match new_parent.as_mut() {
            Some(p) => {
                p.listing.insert(new_name, old_key);
            }
            None => {
                old_parent.listing.insert(new_name, old_key);
            }
        }

        let mut moved = moving;
        moved.set_ctime_ms(now_ms());
        store.insert(old_key, moved.to_vec());
        old_parent.commit(&mut store)?;
        if let Some(p) = new_parent {
            p.commit(&mut store)?;
        }
        Ok(())
    }

    fn stat(&self, path: &Path, _cred: &Credentials) -> Result<Stats> {
        let store = self.store.read().unwrap();
        let key = lookup(&store, path, "stat")?;
        Ok(inode_at(&store, key, path, "stat")?.to_stats())
    }

    fn open_file(&self, path: &Path, flags: OpenFlags, cred: &Credentials) -> Result<FileData> {
        const SYSCALL: &str = "open";
        let store = self.store.read().unwrap();
        let key = lookup(&store, path, SYSCALL)?;
        let inode = inode_at(&store, key, path, SYSCALL)?;
        let stats = inode.to_stats();
        if !stats.has_access(flags.access_mode(), cred) {
            return Err(Error::with(Errno::EACCES, path, SYSCALL));
        }
        let contents = store
            .get(&inode.ino())
            .cloned()
            .ok_or_else(|| Error::with(Errno::EIO, path, SYSCALL))?;
        let mut stats = stats;
        if !stats.is_directory() {
            stats.set_size(contents.len() as u64);
        }
        Ok(FileData::new(stats, contents))
    }

    fn create_file(
        &self,
        path: &Path,
        _flags: OpenFlags,
        mode: u32,
        cred: &Credentials,
    ) -> Result<FileData> {
        let inode = self.commit_new(
            path,
            S_IFREG | (mode & PERMISSION_MASK),
            Vec::new(),
            cred,
            "open",
        )?;
        Ok(FileData::new(inode.to_stats(), Vec::new()))
    }

    fn unlink(&self, path: &Path, cred: &Credentials) -> Result<()> {
        const SYSCALL: &str = "unlink";
        let mut store = self.store.write().unwrap();
        let key = lookup(&store, path, SYSCALL)?;
        if inode_at(&store, key, path, SYSCALL)?.to_stats().is_directory() {
            return Err(Error::with(Errno::EISDIR, path, SYSCALL));
        }
        let mut parent = Parent::open(&store, path, cred, SYSCALL)?;
        parent.listing.remove(basename(path));
        release(&mut store, key, path, SYSCALL)?;
        parent.commit(&mut store)
    }

    fn rmdir(&self, path: &Path, cred: &Credentials) -> Result<()> {
        const SYSCALL: &str = "rmdir";
        let mut store = self.store.write().unwrap();
        let key = lookup(&store, path, SYSCALL)?;
        if is_root(path) {
            return Err(Error::with(Errno::EBUSY, path, SYSCALL));
        }
        let dir = inode_at(&store, key, path, SYSCALL)?;
        if !listing_of(&store, &dir, path, SYSCALL)?.is_empty() {
            return Err(Error::with(Errno::ENOTEMPTY, path, SYSCALL));
        }
        let mut parent = Parent::open(&store, path, cred, SYSCALL)?;
        parent.listing.remove(basename(path));
        store.remove(&dir.ino());
        store.remove(&key);
        parent.commit(&mut store)
    }

    fn mkdir(&self, path: &Path, mode: u32, cred: &Credentials) -> Result<()> {
        self.commit_new(
            path,
            S_IFDIR | (mode & PERMISSION_MASK),
            b"{}".to_vec(),
            cred,
            "mkdir",
        )?;
        Ok(())
    }

    fn readdir(&self, path: &Path, cred: &Credentials) -> Result<Vec<String>> {
        const SYSCALL: &str = "readdir";
        let store = self.store.read().unwrap();
        let key = lookup(&store, path, SYSCALL)?;
        let dir = inode_at(&store, key, path, SYSCALL)?;
        let listing = listing_of(&store, &dir, path, SYSCALL)?;
        if !dir.to_stats().has_access(R_OK, cred) {
            return Err(Error::with(Errno::EACCES, path, SYSCALL));
        }
        Ok(listing.into_keys().collect())
    }

    fn link(&self, target: &Path, new_path: &Path, cred: &Credentials) -> Result<()> {
        const SYSCALL: &str = "link";
        let mut store = self.store.write().unwrap();
        let key = lookup(&store, target, SYSCALL)?;
        let mut inode = inode_at(&store, key, target, SYSCALL)?;
        if inode.to_stats().is_directory() {
            return Err(Error::with(Errno::EPERM, target, SYSCALL));
        }
        let mut parent = Parent::open(&store, new_path, cred, SYSCALL)?;
        let name = basename(new_path);
        if is_root(new_path) || parent.listing.contains_key(name) {
            return Err(Error::with(Errno::EEXIST, new_path, SYSCALL));
        }
        parent.listing.insert(name.to_string(), key);
        inode.set_nlink(inode.nlink() + 1);
        inode.set_ctime_ms(now_ms());
        store.insert(key, inode.to_vec());
        parent.commit(&mut store)
    }

    fn sync(&self, path: &Path, data: &[u8], stats: &Stats) -> Result<()> {
        const SYSCALL: &str = "sync";
        let mut store = self.store.write().unwrap();
        let key = lookup(&store, path, SYSCALL)?;
        let mut inode = inode_at(&store, key, path, SYSCALL)?;

        // A directory's data blob is its listing; only its metadata syncs.
        if inode.to_stats().is_directory() {
            if inode.update(stats) {
                store.insert(key, inode.to_vec());
            }
            return Ok(());
        }

        let old_len = store.get(&inode.ino()).map_or(0, Vec::len);
        if data.len() > old_len {
            self.check_space(&store, (data.len() - old_len) as u64, path, SYSCALL)?;
        }

        let mut stats = *stats;
        stats.set_size(data.len() as u64);
        if inode.update(&stats) {
            store.insert(key, inode.to_vec());
        }
        store.insert(inode.ino(), data.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> Credentials {
        Credentials::root()
    }

    fn write(fs: &InMemory, path: &str, data: &[u8]) {
        let path = Path::new(path);
        let file = fs
            .create_file(path, OpenFlags::parse("w").unwrap(), 0o644, &root())
            .unwrap();
        fs.sync(path, data, &file.stats).unwrap();
    }

    fn read(fs: &InMemory, path: &str) -> Vec<u8> {
        fs.open_file(Path::new(path), OpenFlags::parse("r").unwrap(), &root())
            .unwrap()
            .contents
    }

    #[test]
    fn test_create_and_read() {
        let fs = InMemory::new();
        fs.mkdir(Path::new("/a"), 0o755, &root()).unwrap();
        write(&fs, "/a/b.txt", b"hi");
        assert_eq!(read(&fs, "/a/b.txt"), b"hi");
        let stats = fs.stat(Path::new("/a/b.txt"), &root()).unwrap();
        assert!(stats.is_file());
        assert_eq!(stats.size, 2.0);
        assert_eq!(stats.mode_bits() & PERMISSION_MASK, 0o644);
    }

    #[test]
    fn test_root_exists() {
        let fs = InMemory::new();
        assert!(fs.stat(Path::new("/"), &root()).unwrap().is_directory());
        assert!(fs.readdir(Path::new("/"), &root()).unwrap().is_empty());
    }

    #[test]
    fn test_type_errors() {
        let fs = InMemory::new();
        write(&fs, "/f", b"");
        let err = fs.mkdir(Path::new("/f/x"), 0o755, &root()).unwrap_err();
        assert!(err.is(Errno::ENOTDIR));
        assert!(fs.readdir(Path::new("/f"), &root()).unwrap_err().is(Errno::ENOTDIR));
        assert!(fs.rmdir(Path::new("/f"), &root()).unwrap_err().is(Errno::ENOTDIR));

        fs.mkdir(Path::new("/d"), 0o755, &root()).unwrap();
        assert!(fs.unlink(Path::new("/d"), &root()).unwrap_err().is(Errno::EISDIR));
        assert!(fs.mkdir(Path::new("/d"), 0o755, &root()).unwrap_err().is(Errno::EEXIST));
        assert!(fs.stat(Path::new("/nope"), &root()).unwrap_err().is(Errno::ENOENT));
        assert!(fs.mkdir(Path::new("/x/y"), 0o755, &root()).unwrap_err().is(Errno::ENOENT));
    }

    #[test]
    fn test_rmdir_rules() {
        let fs = InMemory::new();
        fs.mkdir(Path::new("/d"), 0o755, &root()).unwrap();
        write(&fs, "/d/f", b"x");
        assert!(fs.rmdir(Path::new("/d"), &root()).unwrap_err().is(Errno::ENOTEMPTY));
        assert!(fs.rmdir(Path::new("/"), &root()).unwrap_err().is(Errno::EBUSY));
        fs.unlink(Path::new("/d/f"), &root()).unwrap();
        fs.rmdir(Path::new("/d"), &root()).unwrap();
        assert!(fs.readdir(Path::new("/"), &root()).unwrap().is_empty());
    }

    #[test]
    fn test_rename() {
        let fs = InMemory::new();
        fs.mkdir(Path::new("/a"), 0o755, &root()).unwrap();
        write(&fs, "/a/f", b"data");
        fs.rename(Path::new("/a"), Path::new("/c"), &root()).unwrap();
        assert_eq!(read(&fs, "/c/f"), b"data");
        assert!(fs.stat(Path::new("/a"), &root()).unwrap_err().is(Errno::ENOENT));

        fs.rename(Path::new("/c/f"), Path::new("/g"), &root()).unwrap();
        assert_eq!(read(&fs, "/g"), b"data");
        assert!(fs.readdir(Path::new("/c"), &root()).unwrap().is_empty());
    }

    #[test]
    fn test_rename_errors() {
        let fs = InMemory::new();
        fs.mkdir(Path::new("/a"), 0o755, &root()).unwrap();
        fs.mkdir(Path::new("/b"), 0o755, &root()).unwrap();
        write(&fs, "/f", b"1");
        write(&fs, "/g", b"2");

        let err = fs.rename(Path::new("/a"), Path::new("/a/inner"), &root()).unwrap_err();
        assert!(err.is(Errno::EBUSY));
        let err = fs.rename(Path::new("/f"), Path::new("/b"), &root()).unwrap_err();
        assert!(err.is(Errno::EPERM));
        let err = fs.rename(Path::new("/a"), Path::new("/f"), &root()).unwrap_err();
        assert!(err.is(Errno::ENOTDIR));

        fs.rename(Path::new("/f"), Path::new("/g"), &root()).unwrap();
        assert_eq!(read(&fs, "/g"), b"1");
        assert_eq!(fs.readdir(Path::new("/"), &root()).unwrap(), vec!["a", "b", "g"]);
    }

    #[test]
    fn test_hard_links() {
        let fs = InMemory::new();
        write(&fs, "/f", b"shared");
        fs.link(Path::new("/f"), Path::new("/g"), &root()).unwrap();
        assert_eq!(fs.stat(Path::new("/g"), &root()).unwrap().nlink, 2.0);

        fs.unlink(Path::new("/f"), &root()).unwrap();
        assert_eq!(read(&fs, "/g"), b"shared");
        assert_eq!(fs.stat(Path::new("/g"), &root()).unwrap().nlink, 1.0);

        let before = fs.used_space();
        fs.unlink(Path::new("/g"), &root()).unwrap();
        assert!(fs.used_space() < before);

        fs.mkdir(Path::new("/d"), 0o755, &root()).unwrap();
        let err = fs.link(Path::new("/d"), Path::new("/e"), &root()).unwrap_err();
        assert!(err.is(Errno::EPERM));
    }

    #[test]
    fn test_rename_between_links_of_same_inode() {
        let fs = InMemory::new();
        write(&fs, "/a", b"one inode");
        fs.link(Path::new("/a"), Path::new("/b"), &root()).unwrap();

        fs.rename(Path::new("/a"), Path::new("/b"), &root()).unwrap();
        assert_eq!(fs.readdir(Path::new("/"), &root()).unwrap(), vec!["a", "b"]);
        assert_eq!(fs.stat(Path::new("/a"), &root()).unwrap().nlink, 2.0);
        assert_eq!(read(&fs, "/b"), b"one inode");

        fs.unlink(Path::new("/a"), &root()).unwrap();
        assert_eq!(fs.stat(Path::new("/b"), &root()).unwrap().nlink, 1.0);
        assert_eq!(read(&fs, "/b"), b"one inode");
    }

    #[test]
    fn test_parent_write_access() {
        let fs = InMemory::new();
        fs.mkdir(Path::new("/locked"), 0o755, &root()).unwrap();
        let user = Credentials::new(1000, 1000);
        let err = fs.mkdir(Path::new("/locked/x"), 0o755, &user).unwrap_err();
        assert!(err.is(Errno::EACCES));
        let err = fs
            .create_file(Path::new("/locked/f"), OpenFlags::parse("w").unwrap(), 0o644, &user)
            .unwrap_err();
        assert!(err.is(Errno::EACCES));

        fs.mkdir(Path::new("/home"), 0o755, &user).unwrap();
        fs.mkdir(Path::new("/home/x"), 0o755, &user).unwrap();
        assert_eq!(fs.stat(Path::new("/home/x"), &root()).unwrap().uid, 1000.0);
    }

    #[test]
    fn test_open_access() {
        let fs = InMemory::new();
        write(&fs, "/secret", b"s");
        let mut stats = fs.stat(Path::new("/secret"), &root()).unwrap();
        stats.chmod(0o600);
        fs.sync(Path::new("/secret"), b"s", &stats).unwrap();

        let user = Credentials::new(1000, 1000);
        let err = fs
            .open_file(Path::new("/secret"), OpenFlags::parse("r").unwrap(), &user)
            .unwrap_err();
        assert!(err.is(Errno::EACCES));
    }

    #[test]
    fn test_directory_sync_keeps_listing() {
        let fs = InMemory::new();
        fs.mkdir(Path::new("/d"), 0o755, &root()).unwrap();
        write(&fs, "/d/child", b"c");

        let mut stats = fs.stat(Path::new("/d"), &root()).unwrap();
        stats.chmod(0o700);
        fs.sync(Path::new("/d"), b"", &stats).unwrap();

        assert_eq!(fs.readdir(Path::new("/d"), &root()).unwrap(), vec!["child"]);
        let stats = fs.stat(Path::new("/d"), &root()).unwrap();
        assert!(stats.is_directory());
        assert_eq!(stats.mode_bits() & PERMISSION_MASK, 0o700);
        assert_eq!(read(&fs, "/d/child"), b"c");
    }

    #[test]
    fn test_capacity() {
        let fs = InMemory::with_capacity(512);
        write(&fs, "/small", b"ok");
        let file = fs.stat(Path::new("/small"), &root()).unwrap();
        let err = fs.sync(Path::new("/small"), &[1u8; 1024], &file).unwrap_err();
        assert!(err.is(Errno::ENOSPC));
        assert_eq!(read(&fs, "/small"), b"ok");

        let meta = fs.metadata();
        assert_eq!(meta.total_space, 512);
        assert_eq!(meta.free_space, 512 - fs.used_space());
    }
}
