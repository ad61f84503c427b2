// kernel/fs/src/vfs.rs
// Virtual Filesystem: driver registry, mount table, path resolution
// ============================================================================
// Copyright (c) 2025 Cartesian School - Siergej Sobolewski
// SPDX-License-Identifier: BSD-3-Clause

use disk::SectorSource;
use kernel_log::{klog_debug, klog_info, klog_warn};

use crate::arena::NodeArena;
use crate::config::{DotDotPolicy, VfsOptions, MAX_FILESYSTEMS, MAX_MOUNTS};
use crate::error::{FsError, Result};
use crate::name::{Name, NAME_CAPACITY};
use crate::node::{DirEntry, MountId, Node, NodeHandle};
use crate::volume::{FsDriver, Volume};

/// One mounted volume.
pub struct Mount {
    pub drive: u8,
    pub fs_name: &'static str,
    pub volume: Volume,
    /// Directory of another volume this one is attached over.
    pub covers: Option<Node>,
}

/// Fixed table of mounted volumes. Slots are never reused.
pub struct MountTable {
    entries: [Option<Mount>; MAX_MOUNTS],
}

impl MountTable {
    pub fn new() -> Self {
        Self {
            entries: core::array::from_fn(|_| None),
        }
    }

    fn insert(&mut self, mount: Mount) -> Result<MountId> {
        let (id, slot) = self
            .entries
            .iter_mut()
            .enumerate()
            .find(|(_, e)| e.is_none())
            .ok_or(FsError::NoSpace)?;
        *slot = Some(mount);
        Ok(id as MountId)
    }

    pub fn is_full(&self) -> bool {
        self.entries.iter().all(Option::is_some)
    }

    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: MountId) -> Result<&Mount> {
        self.entries
            .get(id as usize)
            .and_then(Option::as_ref)
            .ok_or(FsError::NotMounted)
    }

    pub fn get_mut(&mut self, id: MountId) -> Result<&mut Mount> {
        self.entries
            .get_mut(id as usize)
            .and_then(Option::as_mut)
            .ok_or(FsError::NotMounted)
    }

    pub fn iter(&self) -> impl Iterator<Item = (MountId, &Mount)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_ref().map(|m| (i as MountId, m)))
    }

    /// Mount attached over directory `inode` of volume `mount`.
    fn covering(&self, mount: MountId, inode: u32) -> Option<MountId> {
        self.iter()
            .find(|(_, m)| m.covers.is_some_and(|c| c.mount == mount && c.inode == inode))
            .map(|(id, _)| id)
    }
}

impl Default for MountTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Slash-separated components, empty ones skipped. Overlong components
/// are cut to the name capacity.
struct PathComponents<'a> {
    s: &'a [u8],
    i: usize,
}

impl<'a> PathComponents<'a> {
    fn new(path: &'a str) -> Self {
        Self {
            s: path.as_bytes(),
            i: 0,
        }
    }
}

impl<'a> Iterator for PathComponents<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        while self.i < self.s.len() && self.s[self.i] == b'/' {
            self.i += 1;
        }
        if self.i >= self.s.len() {
            return None;
        }
        let start = self.i;
        while self.i < self.s.len() && self.s[self.i] != b'/' {
            self.i += 1;
        }
        let comp = &self.s[start..self.i];
        Some(&comp[..comp.len().min(NAME_CAPACITY)])
    }
}

/// The VFS context: registered drivers, mounts, the global root and the
/// lookup node ring.
pub struct Vfs {
    drivers: [Option<FsDriver>; MAX_FILESYSTEMS],
    mounts: MountTable,
    root: Option<MountId>,
    nodes: NodeArena,
    options: VfsOptions,
}

impl Vfs {
    pub fn new(options: VfsOptions) -> Self {
        Self {
            drivers: [None; MAX_FILESYSTEMS],
            mounts: MountTable::new(),
            root: None,
            nodes: NodeArena::new(),
            options,
        }
    }

    pub fn options(&self) -> VfsOptions {
        self.options
    }

    pub fn mounts(&self) -> &MountTable {
        &self.mounts
    }

    /// Add a filesystem type. Names are not deduplicated; lookups take the
    /// first registration.
    pub fn register(&mut self, driver: FsDriver) -> Result<()> {
        let slot = self
            .drivers
            .iter_mut()
            .find(|d| d.is_none())
            .ok_or(FsError::InvalidArgument)?;
        *slot = Some(driver);
        klog_debug!("vfs", "registered filesystem '{}'", driver.name);
        Ok(())
    }

    pub fn driver(&self, name: &str) -> Option<FsDriver> {
        self.drivers.iter().flatten().find(|d| d.name == name).copied()
    }

    /// Mount `drive` as `fs_name`. The first successful mount becomes the
    /// root and stays the root.
    pub fn mount(&mut self, dev: &mut dyn SectorSource, drive: u8, fs_name: &str) -> Result<MountId> {
        let driver = self.driver(fs_name).ok_or(FsError::NotFound)?;
        if self.mounts.is_full() {
            return Err(FsError::NoSpace);
        }

        let volume = (driver.mount)(dev, drive).map_err(|e| {
            klog_warn!("vfs", "mount of drive {} as {} failed: {}", drive, fs_name, e);
            e
        })?;
        let id = self.mounts.insert(Mount {
            drive,
            fs_name: driver.name,
            volume,
            covers: None,
        })?;

        if self.root.is_none() {
            self.root = Some(id);
            klog_info!("vfs", "drive {} ({}) mounted as root", drive, driver.name);
        } else {
            klog_info!("vfs", "drive {} ({}) mounted as volume {}", drive, driver.name, id);
        }
        Ok(id)
    }

    /// Run the driver's unmount hook. The mount stays in the table.
    pub fn unmount(&mut self, id: MountId) -> Result<()> {
        let fs_name = self.mounts.get(id)?.fs_name;
        let driver = self.driver(fs_name).ok_or(FsError::NotFound)?;
        (driver.unmount)(&mut self.mounts.get_mut(id)?.volume)
    }

    pub fn volume(&self, id: MountId) -> Result<&Volume> {
        Ok(&self.mounts.get(id)?.volume)
    }

    pub fn root(&self) -> Result<NodeHandle> {
        self.root.map(NodeHandle::Root).ok_or(FsError::NotMounted)
    }

    fn root_node(&self, id: MountId) -> Result<Node> {
        let mount = self.mounts.get(id)?;
        Ok(Node::new(Name::from_bytes(b"/"), mount.volume.fs().root(), id))
    }

    /// The node behind `handle`, without following a mount redirect.
    pub fn node(&self, handle: NodeHandle) -> Result<Node> {
        match handle {
            NodeHandle::Root(id) => self.root_node(id),
            NodeHandle::Slot { index, generation } => self.nodes.get(index, generation).copied(),
        }
    }

    /// Swap a mount point for the root of the volume mounted on it.
    fn follow(&self, node: Node) -> Result<Node> {
        match node.redirect {
            Some(target) => self.root_node(target),
            None => Ok(node),
        }
    }

    /// The node operations on `handle` actually act on.
    pub fn resolve(&self, handle: NodeHandle) -> Result<Node> {
        self.follow(self.node(handle)?)
    }

    fn lookup_in(&mut self, dev: &mut dyn SectorSource, dir: &Node, name: &[u8]) -> Result<NodeHandle> {
        if !dir.is_dir() {
            return Err(FsError::NotDirectory);
        }
        let found = self
            .mounts
            .get_mut(dir.mount)?
            .volume
            .fs_mut()
            .finddir(dev, &dir.extent, name)?
            .ok_or(FsError::NotFound)?;

        let mut node = Node::new(found.name, found.extent, dir.mount);
        if node.is_dir() {
            node.redirect = self.mounts.covering(dir.mount, node.inode);
        }
        Ok(self.nodes.alloc(node))
    }

    /// Look `name` up in directory `dir`.
    pub fn finddir(&mut self, dev: &mut dyn SectorSource, dir: NodeHandle, name: &str) -> Result<NodeHandle> {
        let dir = self.resolve(dir)?;
        self.lookup_in(dev, &dir, name.as_bytes())
    }

    /// Parent of `handle` through the `..` record, stepping back over a
    /// mount point when `handle` is a mounted volume's root.
    fn parent(&mut self, dev: &mut dyn SectorSource, handle: NodeHandle) -> Result<NodeHandle> {
        let node = self.resolve(handle)?;
        let mount = self.mounts.get(node.mount)?;
        let at_root = node.inode == mount.volume.fs().root().lba;
        let covers = mount.covers;

        match (at_root, covers) {
            (true, Some(covered)) => self.lookup_in(dev, &covered, b".."),
            (true, None) => Ok(NodeHandle::Root(node.mount)),
            (false, _) => self.lookup_in(dev, &node, b".."),
        }
    }

    /// Resolve an absolute path. `/` and the empty path give the root
    /// without touching the device. A file met where a directory is needed
    /// ends the walk as `NotFound`.
    pub fn namei(&mut self, dev: &mut dyn SectorSource, path: &str) -> Result<NodeHandle> {
        self.walk_path(dev, path).map_err(|e| match e {
            FsError::NotDirectory => FsError::NotFound,
            other => other,
        })
    }

    fn walk_path(&mut self, dev: &mut dyn SectorSource, path: &str) -> Result<NodeHandle> {
        let mut cur = self.root()?;
        for comp in PathComponents::new(path) {
            match comp {
                b"." => {}
                b".." => {
                    if self.options.dotdot == DotDotPolicy::Lookup {
                        cur = self.parent(dev, cur)?;
                    }
                }
                _ => {
                    let dir = self.resolve(cur)?;
                    cur = self.lookup_in(dev, &dir, comp)?;
                }
            }
        }
        Ok(cur)
    }

    pub fn read(&mut self, dev: &mut dyn SectorSource, handle: NodeHandle, offset: u32, buf: &mut [u8]) -> Result<usize> {
        let node = self.node(handle)?;
        self.read_node(dev, &node, offset, buf)
    }

    /// Read through a node copy held outside the ring.
    pub fn read_node(&mut self, dev: &mut dyn SectorSource, node: &Node, offset: u32, buf: &mut [u8]) -> Result<usize> {
        let node = self.follow(*node)?;
        if node.is_dir() {
            return Err(FsError::IsDirectory);
        }
        self.mounts
            .get_mut(node.mount)?
            .volume
            .fs_mut()
            .read(dev, &node.extent, offset, buf)
    }

    /// Every supported volume is read-only.
    pub fn write(&mut self, handle: NodeHandle, _offset: u32, _data: &[u8]) -> Result<usize> {
        self.resolve(handle)?;
        Err(FsError::InvalidArgument)
    }

    pub fn open(&mut self, handle: NodeHandle) -> Result<Node> {
        self.resolve(handle)
    }

    pub fn close(&mut self, handle: NodeHandle) -> Result<()> {
        self.resolve(handle).map(|_| ())
    }

    /// `index`-th entry of a directory, `None` past the last one.
    pub fn readdir(&mut self, dev: &mut dyn SectorSource, handle: NodeHandle, index: u32) -> Result<Option<DirEntry>> {
        let node = self.node(handle)?;
        self.readdir_node(dev, &node, index)
    }

    pub fn readdir_node(&mut self, dev: &mut dyn SectorSource, node: &Node, index: u32) -> Result<Option<DirEntry>> {
        let node = self.follow(*node)?;
        if !node.is_dir() {
            return Err(FsError::NotDirectory);
        }
        self.mounts
            .get_mut(node.mount)?
            .volume
            .fs_mut()
            .readdir(dev, &node.extent, index)
    }

    /// Attach volume `target` over the directory at `path`.
    pub fn set_mountpoint(&mut self, dev: &mut dyn SectorSource, path: &str, target: MountId) -> Result<()> {
        if self.mounts.get(target)?.covers.is_some() {
            return Err(FsError::Exists);
        }
        if self.root == Some(target) {
            return Err(FsError::InvalidArgument);
        }

        let handle = self.namei(dev, path)?;
        if let NodeHandle::Root(_) = handle {
            return Err(FsError::InvalidArgument);
        }
        let mut node = self.node(handle)?;
        if node.redirect.is_some() {
            return Err(FsError::Exists);
        }
        if !node.is_dir() {
            return Err(FsError::NotDirectory);
        }
        if node.mount == target {
            return Err(FsError::InvalidArgument);
        }

        node.redirect = None;
        self.mounts.get_mut(target)?.covers = Some(node);
        self.nodes.for_each_mut(|n| {
            if n.mount == node.mount && n.inode == node.inode && n.is_dir() {
                n.redirect = Some(target);
            }
        });
        klog_info!("vfs", "volume {} attached at {}", target, path);
        Ok(())
    }
}

impl Default for Vfs {
    fn default() -> Self {
        Self::new(VfsOptions::default())
    }
}
