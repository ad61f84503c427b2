// kernel/fs/src/testing.rs
// In-memory ISO images and sector sources for host-side tests
// ============================================================================
// Copyright (c) 2025 Cartesian School - Siergej Sobolewski
// SPDX-License-Identifier: BSD-3-Clause

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use disk::{DiskError, Result as DiskResult, SectorSource};

use crate::config::{ISO_PVD_SECTOR, ISO_SECTOR_SIZE};

const FLAG_DIR: u8 = 0x02;
const NM_CONTINUE: u8 = 0x01;
// 2025-01-01 00:00:00 UTC
const RECORDED: [u8; 7] = [125, 1, 1, 0, 0, 0, 0];

/// A file or directory to lay out.
pub struct Entry {
    iso: String,
    long: String,
    rr: Option<String>,
    kind: EntryKind,
}

enum EntryKind {
    File(Vec<u8>),
    Dir(Vec<Entry>),
}

impl Entry {
    /// `iso` is the raw primary-tree name (`README.TXT;1`), `long` the
    /// Joliet / Rock Ridge name.
    pub fn file(iso: &str, long: &str, data: &[u8]) -> Self {
        Self {
            iso: iso.into(),
            long: long.into(),
            rr: None,
            kind: EntryKind::File(data.to_vec()),
        }
    }

    pub fn dir(iso: &str, long: &str, children: Vec<Entry>) -> Self {
        Self {
            iso: iso.into(),
            long: long.into(),
            rr: None,
            kind: EntryKind::Dir(children),
        }
    }

    /// Give the Rock Ridge NM entry a name different from the Joliet one.
    pub fn rock_ridge_name(mut self, name: &str) -> Self {
        self.rr = Some(name.into());
        self
    }
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum Tree {
    Primary,
    Joliet,
}

#[derive(Copy, Clone)]
enum Target {
    Dir(usize),
    File(usize),
}

struct Child {
    name: Vec<u8>,
    long: String,
    target: Target,
}

struct DirPlan {
    parent: usize,
    children: Vec<Child>,
    lba: u32,
    sectors: u32,
}

/// Where the second half of a Rock Ridge name went.
#[derive(Copy, Clone)]
struct Slot {
    block: u32,
    offset: u32,
}

/// Builds a small, valid ISO9660 image.
///
/// Layout: system area, PVD at 16, optional Joliet SVD, terminator, then
/// directory extents, continuation areas and file data. Rock Ridge
/// entries go into the tree names are resolved from (Joliet when
/// enabled).
pub struct IsoBuilder {
    label: String,
    joliet: bool,
    rock_ridge: bool,
    continuation: bool,
    susp_skip: u8,
    root: Vec<Entry>,
}

impl IsoBuilder {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.into(),
            joliet: false,
            rock_ridge: false,
            continuation: false,
            susp_skip: 0,
            root: Vec::new(),
        }
    }

    pub fn joliet(mut self, on: bool) -> Self {
        self.joliet = on;
        self
    }

    pub fn rock_ridge(mut self, on: bool) -> Self {
        self.rock_ridge = on;
        self
    }

    /// Split every Rock Ridge name across a CE continuation area.
    pub fn continuation(mut self, on: bool) -> Self {
        self.continuation = on;
        self.rock_ridge |= on;
        self
    }

    /// Bytes announced by the SP entry to skip in every system use area.
    pub fn susp_skip(mut self, skip: u8) -> Self {
        self.susp_skip = skip;
        self
    }

    pub fn add(mut self, entry: Entry) -> Self {
        self.root.push(entry);
        self
    }

    fn rr_tree(&self) -> Tree {
        if self.joliet {
            Tree::Joliet
        } else {
            Tree::Primary
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let mut files = Vec::new();
        collect_files(&self.root, &mut files);

        let mut trees = Vec::new();
        for tree in [Tree::Primary, Tree::Joliet] {
            if tree == Tree::Joliet && !self.joliet {
                continue;
            }
            let mut dirs = Vec::new();
            flatten(&self.root, 0, tree, &mut dirs, &mut 0);
            trees.push((tree, dirs));
        }

        // Descriptors
        let mut lba = ISO_PVD_SECTOR + 1;
        let svd = self.joliet.then(|| {
            lba += 1;
            lba - 1
        });
        let terminator = lba;
        lba += 1;

        // Directory extents; record sizes do not depend on placement
        for (tree, dirs) in trees.iter_mut() {
            let plan: &[DirPlan] = dirs;
            let sizes: Vec<u32> = (0..plan.len())
                .map(|d| pack(&self.records(*tree, plan, d, &[], &[], None)).len() as u32)
                .collect();
            for (dir, bytes) in dirs.iter_mut().zip(sizes) {
                dir.sectors = bytes / ISO_SECTOR_SIZE as u32;
                dir.lba = lba;
                lba += dir.sectors;
            }
        }

        // Continuation areas for the second half of each Rock Ridge name
        let mut slots: Vec<Vec<Slot>> = Vec::new();
        let mut tails: Vec<(Slot, Vec<u8>)> = Vec::new();
        if self.continuation {
            if let Some((_, dirs)) = trees.iter().find(|(t, _)| *t == self.rr_tree()) {
                let mut block = lba;
                let mut offset = 0u32;
                for dir in dirs {
                    let mut row = Vec::new();
                    for child in &dir.children {
                        let (_, tail) = split_name(&child.long);
                        let bytes = nm(0, tail);
                        if offset as usize + bytes.len() > ISO_SECTOR_SIZE {
                            block += 1;
                            offset = 0;
                        }
                        let slot = Slot { block, offset };
                        offset += bytes.len() as u32;
                        row.push(slot);
                        tails.push((slot, bytes));
                    }
                    slots.push(row);
                }
                lba = block + 1;
            }
        }

        let mut file_lbas = Vec::new();
        for data in &files {
            file_lbas.push(lba);
            lba += data.len().div_ceil(ISO_SECTOR_SIZE) as u32;
        }

        let total = lba as usize;
        let mut image = vec![0u8; total * ISO_SECTOR_SIZE];

        for (tree, dirs) in &trees {
            let slots = (*tree == self.rr_tree() && self.continuation).then_some(&slots[..]);
            for d in 0..dirs.len() {
                let bytes = pack(&self.records(*tree, dirs, d, &file_lbas, &files, slots));
                let at = dirs[d].lba as usize * ISO_SECTOR_SIZE;
                image[at..at + bytes.len()].copy_from_slice(&bytes);
            }
        }
        for (slot, bytes) in &tails {
            let at = slot.block as usize * ISO_SECTOR_SIZE + slot.offset as usize;
            image[at..at + bytes.len()].copy_from_slice(bytes);
        }
        for (data, &at) in files.iter().zip(&file_lbas) {
            let at = at as usize * ISO_SECTOR_SIZE;
            image[at..at + data.len()].copy_from_slice(data);
        }

        let root_of = |tree: Tree| {
            trees
                .iter()
                .find(|(t, _)| *t == tree)
                .map_or((0, 0), |(_, d)| (d[0].lba, d[0].sectors * ISO_SECTOR_SIZE as u32))
        };

        let pvd = self.descriptor(1, total as u32, root_of(Tree::Primary));
        put_sector(&mut image, ISO_PVD_SECTOR, &pvd);
        if let Some(at) = svd {
            let mut sd = self.descriptor(2, total as u32, root_of(Tree::Joliet));
            sd[88..91].copy_from_slice(&[0x25, 0x2F, 0x45]);
            put_sector(&mut image, at, &sd);
        }
        let mut term = [0u8; ISO_SECTOR_SIZE];
        term[0] = 255;
        term[1..6].copy_from_slice(b"CD001");
        term[6] = 1;
        put_sector(&mut image, terminator, &term);

        image
    }

    fn descriptor(&self, kind: u8, total: u32, root: (u32, u32)) -> [u8; ISO_SECTOR_SIZE] {
        let mut s = [0u8; ISO_SECTOR_SIZE];
        s[0] = kind;
        s[1..6].copy_from_slice(b"CD001");
        s[6] = 1;
        s[40..72].fill(b' ');
        let label = self.label.as_bytes();
        let n = label.len().min(32);
        s[40..40 + n].copy_from_slice(&label[..n]);
        both32(&mut s, 80, total);
        both16(&mut s, 120, 1);
        both16(&mut s, 124, 1);
        both16(&mut s, 128, ISO_SECTOR_SIZE as u16);
        let rec = record(root.0, root.1, FLAG_DIR, &[0], &[]);
        s[156..156 + rec.len()].copy_from_slice(&rec);
        s
    }

    fn system_use(&self, child: &Child, slot: Option<Slot>) -> Vec<u8> {
        let mut su = vec![0u8; self.susp_skip as usize];
        if self.continuation {
            let (head, tail) = split_name(&child.long);
            let slot = slot.unwrap_or(Slot { block: 0, offset: 0 });
            su.extend(nm(NM_CONTINUE, head));
            su.extend(ce(slot.block, slot.offset, nm(0, tail).len() as u32));
        } else {
            su.extend(nm(0, child.long.as_bytes()));
        }
        su
    }

    fn records(
        &self,
        tree: Tree,
        dirs: &[DirPlan],
        d: usize,
        file_lbas: &[u32],
        files: &[Vec<u8>],
        slots: Option<&[Vec<Slot>]>,
    ) -> Vec<Vec<u8>> {
        let dir = &dirs[d];
        let parent = &dirs[dir.parent];
        let rr = self.rock_ridge && tree == self.rr_tree();
        let span = |p: &DirPlan| p.sectors * ISO_SECTOR_SIZE as u32;

        let dot_su = if rr && d == 0 {
            vec![b'S', b'P', 7, 1, 0xBE, 0xEF, self.susp_skip]
        } else {
            Vec::new()
        };

        let mut out = vec![
            record(dir.lba, span(dir), FLAG_DIR, &[0], &dot_su),
            record(parent.lba, span(parent), FLAG_DIR, &[1], &[]),
        ];
        for (c, child) in dir.children.iter().enumerate() {
            let (extent, size, flags) = match child.target {
                Target::Dir(i) => (dirs[i].lba, span(&dirs[i]), FLAG_DIR),
                Target::File(i) => (
                    file_lbas.get(i).copied().unwrap_or(0),
                    files.get(i).map_or(0, |f| f.len() as u32),
                    0,
                ),
            };
            let su = if rr {
                self.system_use(child, slots.map(|s| s[d][c]))
            } else {
                Vec::new()
            };
            out.push(record(extent, size, flags, &child.name, &su));
        }
        out
    }
}

fn collect_files(entries: &[Entry], out: &mut Vec<Vec<u8>>) {
    for e in entries {
        match &e.kind {
            EntryKind::File(data) => out.push(data.clone()),
            EntryKind::Dir(children) => collect_files(children, out),
        }
    }
}

fn flatten(entries: &[Entry], parent: usize, tree: Tree, dirs: &mut Vec<DirPlan>, next_file: &mut usize) -> usize {
    let me = dirs.len();
    dirs.push(DirPlan {
        parent,
        children: Vec::new(),
        lba: 0,
        sectors: 0,
    });

    let mut children = Vec::new();
    for e in entries {
        let (target, is_file) = match &e.kind {
            EntryKind::File(_) => {
                *next_file += 1;
                (Target::File(*next_file - 1), true)
            }
            EntryKind::Dir(sub) => (Target::Dir(flatten(sub, me, tree, dirs, next_file)), false),
        };
        let name = match tree {
            Tree::Primary => e.iso.as_bytes().to_vec(),
            Tree::Joliet => ucs2(&e.long, is_file),
        };
        children.push(Child {
            name,
            long: e.rr.clone().unwrap_or_else(|| e.long.clone()),
            target,
        });
    }
    dirs[me].children = children;
    me
}

fn ucs2(name: &str, versioned: bool) -> Vec<u8> {
    let mut out = Vec::new();
    let suffix = if versioned { ";1" } else { "" };
    for ch in name.chars().chain(suffix.chars()) {
        let cp = if (ch as u32) <= 0xFFFF { ch as u32 as u16 } else { 0xFFFD };
        out.extend_from_slice(&cp.to_be_bytes());
    }
    out
}

fn split_name(long: &str) -> (&[u8], &[u8]) {
    let bytes = long.as_bytes();
    bytes.split_at(bytes.len() / 2)
}

fn nm(flags: u8, name: &[u8]) -> Vec<u8> {
    let mut e = vec![b'N', b'M', (5 + name.len()) as u8, 1, flags];
    e.extend_from_slice(name);
    e
}

fn ce(block: u32, offset: u32, length: u32) -> Vec<u8> {
    let mut e = vec![0u8; 28];
    e[..4].copy_from_slice(&[b'C', b'E', 28, 1]);
    both32(&mut e, 4, block);
    both32(&mut e, 12, offset);
    both32(&mut e, 20, length);
    e
}

fn both32(buf: &mut [u8], at: usize, v: u32) {
    buf[at..at + 4].copy_from_slice(&v.to_le_bytes());
    buf[at + 4..at + 8].copy_from_slice(&v.to_be_bytes());
}

fn both16(buf: &mut [u8], at: usize, v: u16) {
    buf[at..at + 2].copy_from_slice(&v.to_le_bytes());
    buf[at + 2..at + 4].copy_from_slice(&v.to_be_bytes());
}

fn record(extent: u32, size: u32, flags: u8, name: &[u8], su: &[u8]) -> Vec<u8> {
    let pad = usize::from(name.len() % 2 == 0);
    let mut len = 33 + name.len() + pad + su.len();
    len += len % 2;
    assert!(len <= 255, "directory record too long");

    let mut r = vec![0u8; len];
    r[0] = len as u8;
    both32(&mut r, 2, extent);
    both32(&mut r, 10, size);
    r[18..25].copy_from_slice(&RECORDED);
    r[25] = flags;
    both16(&mut r, 28, 1);
    r[32] = name.len() as u8;
    r[33..33 + name.len()].copy_from_slice(name);
    let at = 33 + name.len() + pad;
    r[at..at + su.len()].copy_from_slice(su);
    r
}

/// Lay records out so none crosses a sector boundary.
fn pack(records: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut used = 0;
    for r in records {
        if used + r.len() > ISO_SECTOR_SIZE {
            out.resize(out.len() + ISO_SECTOR_SIZE - used, 0);
            used = 0;
        }
        out.extend_from_slice(r);
        used += r.len();
    }
    out.resize(out.len().div_ceil(ISO_SECTOR_SIZE).max(1) * ISO_SECTOR_SIZE, 0);
    out
}

fn put_sector(image: &mut [u8], lba: u32, sector: &[u8; ISO_SECTOR_SIZE]) {
    let at = lba as usize * ISO_SECTOR_SIZE;
    image[at..at + ISO_SECTOR_SIZE].copy_from_slice(sector);
}

/// Sector source over in-memory images, one per drive number.
pub struct MemDisk {
    drives: Vec<(u8, Vec<u8>)>,
    optical: bool,
    fail_from: Option<u32>,
    reads: usize,
}

impl MemDisk {
    pub fn new(drive: u8, image: Vec<u8>) -> Self {
        Self {
            drives: vec![(drive, image)],
            optical: true,
            fail_from: None,
            reads: 0,
        }
    }

    pub fn with_drive(mut self, drive: u8, image: Vec<u8>) -> Self {
        self.drives.push((drive, image));
        self
    }

    pub fn with_optical(mut self, optical: bool) -> Self {
        self.optical = optical;
        self
    }

    /// Make every read at or beyond `lba` fail.
    pub fn fail_from(&mut self, lba: Option<u32>) {
        self.fail_from = lba;
    }

    /// Successful block reads so far.
    pub fn reads(&self) -> usize {
        self.reads
    }

    pub fn image_mut(&mut self, drive: u8) -> Option<&mut Vec<u8>> {
        self.drives.iter_mut().find(|(d, _)| *d == drive).map(|(_, i)| i)
    }
}

impl SectorSource for MemDisk {
    fn is_optical(&self, drive: u8) -> bool {
        self.optical && self.drives.iter().any(|(d, _)| *d == drive)
    }

    fn read_blocks(&mut self, drive: u8, lba: u32, count: u8, buf: &mut [u8]) -> DiskResult<()> {
        let image = &self
            .drives
            .iter()
            .find(|(d, _)| *d == drive)
            .ok_or(DiskError::NoDevice)?
            .1;
        if self.fail_from.is_some_and(|f| lba >= f) {
            return Err(DiskError::ReadError);
        }
        let len = count as usize * ISO_SECTOR_SIZE;
        let start = lba as usize * ISO_SECTOR_SIZE;
        if count == 0 || buf.len() < len {
            return Err(DiskError::InvalidParameter);
        }
        if start + len > image.len() {
            return Err(DiskError::ReadError);
        }
        buf[..len].copy_from_slice(&image[start..start + len]);
        self.reads += 1;
        Ok(())
    }
}
