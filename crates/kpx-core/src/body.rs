//! TLV record codec for the plaintext KDB body.
//!
//! The body is every group record (pre-order) followed by every entry
//! record. A record is a run of fields
//!
//! ```text
//! u16 field_type | u32 field_size | field_size bytes
//! ```
//!
//! closed by an end field (`0xFFFF`, size 0). Strings are NUL-terminated;
//! unset strings are a lone NUL.
//!
//! Records are assembled as nested byte chunks and flattened into the byte
//! stream, so the contents hash is fed chunk by chunk without first
//! concatenating the body.

use crate::entry::Entry;
use crate::group::Group;
use crate::header::Header;
use crate::packed_time::{self, NEVER};
use crate::root::Root;
use crate::types::{EntryUuid, GroupId};
use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDateTime;
use kpx_util::{checksum, flatten, Flat, Nested};
use tracing::debug;

/// Field type closing every record.
pub const FIELD_END: u16 = 0xFFFF;
/// Field type that is always skipped.
pub const FIELD_IGNORE: u16 = 0x0000;

/// Group field types.
pub mod group_field {
    /// Group id (u32).
    pub const ID: u16 = 0x0001;
    /// Title (C string).
    pub const TITLE: u16 = 0x0002;
    /// Creation time (packed, unused by KeePassX).
    pub const CREATION: u16 = 0x0003;
    /// Last modification (packed, unused).
    pub const LAST_MOD: u16 = 0x0004;
    /// Last access (packed, unused).
    pub const LAST_ACCESS: u16 = 0x0005;
    /// Expiry (packed, unused).
    pub const EXPIRE: u16 = 0x0006;
    /// Icon index (u32).
    pub const IMAGE: u16 = 0x0007;
    /// Tree level (u16).
    pub const LEVEL: u16 = 0x0008;
    /// Flags (u32, unused).
    pub const FLAGS: u16 = 0x0009;
}

/// Entry field types.
pub mod entry_field {
    /// Entry uuid (16 bytes).
    pub const UUID: u16 = 0x0001;
    /// Owning group id (u32).
    pub const GROUP_ID: u16 = 0x0002;
    /// Icon index (u32).
    pub const IMAGE: u16 = 0x0003;
    /// Title.
    pub const TITLE: u16 = 0x0004;
    /// URL.
    pub const URL: u16 = 0x0005;
    /// Username.
    pub const USERNAME: u16 = 0x0006;
    /// Password.
    pub const PASSWORD: u16 = 0x0007;
    /// Comment.
    pub const COMMENT: u16 = 0x0008;
    /// Creation time.
    pub const CREATION: u16 = 0x0009;
    /// Last modification time.
    pub const LAST_MOD: u16 = 0x000A;
    /// Last access time.
    pub const LAST_ACCESS: u16 = 0x000B;
    /// Expiry time.
    pub const EXPIRE: u16 = 0x000C;
    /// Attachment description.
    pub const BINARY_DESC: u16 = 0x000D;
    /// Attachment payload (raw bytes, no terminator).
    pub const BINARY: u16 = 0x000E;
}

/// Plaintext bodies above this size are rejected as corrupt.
pub const MAX_BODY_SIZE: usize = 214_783_446;

type Chunk = Vec<u8>;

fn field(ty: u16, data: Chunk) -> Result<Nested<Chunk>> {
    let size = u32::try_from(data.len()).with_context(|| format!("field {ty:#06x} too large"))?;
    Ok(Nested::Seq(vec![
        Nested::Scalar(ty.to_le_bytes().to_vec()),
        Nested::Scalar(size.to_le_bytes().to_vec()),
        Nested::Scalar(data),
    ]))
}

fn cstr(s: &str) -> Chunk {
    let mut v = Vec::with_capacity(s.len() + 1);
    v.extend_from_slice(s.as_bytes());
    v.push(0);
    v
}

fn time(t: Option<NaiveDateTime>) -> Result<Chunk> {
    Ok(packed_time::pack(t)?.to_vec())
}

fn group_record(g: &Group) -> Result<Nested<Chunk>> {
    use group_field as f;
    Ok(Nested::Seq(vec![
        field(f::ID, g.group_id.0.to_le_bytes().to_vec())?,
        field(f::TITLE, cstr(&g.title))?,
        field(f::CREATION, NEVER.to_vec())?,
        field(f::LAST_MOD, NEVER.to_vec())?,
        field(f::LAST_ACCESS, NEVER.to_vec())?,
        field(f::EXPIRE, NEVER.to_vec())?,
        field(f::IMAGE, g.image.to_le_bytes().to_vec())?,
        field(f::LEVEL, g.level.to_le_bytes().to_vec())?,
        field(f::FLAGS, 0u32.to_le_bytes().to_vec())?,
        field(FIELD_END, Vec::new())?,
    ]))
}

fn entry_record(e: &Entry) -> Result<Nested<Chunk>> {
    use entry_field as f;
    Ok(Nested::Seq(vec![
        field(f::UUID, e.uuid.0.to_vec())?,
        field(f::GROUP_ID, e.group_id.0.to_le_bytes().to_vec())?,
        field(f::IMAGE, e.image.to_le_bytes().to_vec())?,
        field(f::TITLE, cstr(&e.title))?,
        field(f::URL, cstr(&e.url))?,
        field(f::USERNAME, cstr(&e.username))?,
        field(f::PASSWORD, cstr(&e.password))?,
        field(f::COMMENT, cstr(&e.comment))?,
        field(f::CREATION, time(Some(e.creation))?)?,
        field(f::LAST_MOD, time(Some(e.last_mod))?)?,
        field(f::LAST_ACCESS, time(Some(e.last_access))?)?,
        field(f::EXPIRE, time(e.expire)?)?,
        field(f::BINARY_DESC, cstr(&e.binary_desc))?,
        field(f::BINARY, e.binary.clone())?,
        field(FIELD_END, Vec::new())?,
    ]))
}

/// All records of `root`, in file order, as nested chunks.
fn records(root: &Root) -> Result<(Vec<Nested<Chunk>>, u32, u32)> {
    let (groups, entries) = root.groups_and_entries();
    let n_groups = u32::try_from(groups.len()).context("too many groups")?;
    let n_entries = u32::try_from(entries.len()).context("too many entries")?;

    let mut out = Vec::with_capacity(groups.len() + entries.len());
    for g in groups {
        out.push(group_record(g)?);
    }
    for e in entries {
        out.push(entry_record(e)?);
    }
    Ok((out, n_groups, n_entries))
}

fn chunks(records: &[Nested<Chunk>]) -> impl Iterator<Item = &Chunk> {
    flatten(records).filter_map(Flat::scalar)
}

/// Serialize `root` to a plaintext body (groups, then entries).
pub fn encode_body(root: &Root) -> Result<Vec<u8>> {
    let (recs, _, _) = records(root)?;
    Ok(chunks(&recs).flatten().copied().collect())
}

/// Serialize `root`, and update `header` counts and `contents_hash` to match.
///
/// The per-save seed and IV are refreshed.
pub fn seal(root: &Root, header: &mut Header) -> Result<Vec<u8>> {
    let (recs, n_groups, n_entries) = records(root)?;
    header.num_groups = n_groups;
    header.num_entries = n_entries;
    header.contents_hash = checksum(chunks(&recs));
    header.reseed();
    Ok(chunks(&recs).flatten().copied().collect())
}

/// Verify `body` against `header.contents_hash`, then decode it.
pub fn open(header: &Header, body: &[u8]) -> Result<Root> {
    if body.len() > MAX_BODY_SIZE || (body.is_empty() && header.num_groups > 0) {
        bail!("body is empty or oversized: the key is wrong or the file is damaged");
    }
    if kpx_util::checksum_one(body) != header.contents_hash {
        bail!("hash test failed: the key is wrong or the file is damaged");
    }
    decode_body(body, header.num_groups, header.num_entries)
}

/// TLV cursor over the body.
struct Fields<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Fields<'a> {
    fn next_field(&mut self) -> Result<(u16, &'a [u8])> {
        let head = self
            .data
            .get(self.pos..self.pos + 6)
            .ok_or_else(|| anyhow!("EOF while reading field header at offset {}", self.pos))?;
        let ty = u16::from_le_bytes([head[0], head[1]]);
        let size = u32::from_le_bytes([head[2], head[3], head[4], head[5]]) as usize;
        self.pos += 6;

        let data = self
            .data
            .get(self.pos..self.pos + size)
            .ok_or_else(|| anyhow!("EOF while reading {size}-byte field {ty:#06x}"))?;
        self.pos += size;
        Ok((ty, data))
    }
}

fn le_u32(ty: u16, d: &[u8]) -> Result<u32> {
    let b: [u8; 4] = d
        .get(..4)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| anyhow!("field {ty:#06x}: expected 4 bytes, got {}", d.len()))?;
    Ok(u32::from_le_bytes(b))
}

fn le_u16(ty: u16, d: &[u8]) -> Result<u16> {
    let b: [u8; 2] = d
        .get(..2)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| anyhow!("field {ty:#06x}: expected 2 bytes, got {}", d.len()))?;
    Ok(u16::from_le_bytes(b))
}

/// C string up to the first NUL (or the whole field if unterminated).
fn read_cstr(ty: u16, d: &[u8]) -> Result<String> {
    let end = d.iter().position(|&b| b == 0).unwrap_or(d.len());
    String::from_utf8(d[..end].to_vec()).with_context(|| format!("field {ty:#06x}: invalid UTF-8"))
}

fn read_time(ty: u16, d: &[u8]) -> Result<Option<NaiveDateTime>> {
    packed_time::unpack_slice(d).with_context(|| format!("field {ty:#06x}"))
}

#[derive(Default)]
struct GroupDraft {
    id: Option<GroupId>,
    title: Option<String>,
    image: Option<u32>,
    level: Option<u16>,
}

impl GroupDraft {
    fn set(&mut self, ty: u16, d: &[u8]) -> Result<()> {
        use group_field as f;
        match ty {
            f::ID => self.id = Some(GroupId(le_u32(ty, d)?)),
            f::TITLE => self.title = Some(read_cstr(ty, d)?),
            f::IMAGE => self.image = Some(le_u32(ty, d)?),
            f::LEVEL => self.level = Some(le_u16(ty, d)?),
            // No longer used by KeePassX but still part of the format.
            f::CREATION | f::LAST_MOD | f::LAST_ACCESS | f::EXPIRE | f::FLAGS | FIELD_IGNORE => {}
            other => debug!(field = other, "skipping unknown group field"),
        }
        Ok(())
    }

    fn finish(self, index: usize) -> Result<Group> {
        let (Some(id), Some(title), Some(image), Some(level)) = (self.id, self.title, self.image, self.level)
        else {
            bail!("invalid group record #{index}: missing mandatory field");
        };
        let mut g = Group::new(id, title, level);
        g.image = image;
        if !g.is_valid() {
            bail!("invalid group {g}");
        }
        Ok(g)
    }
}

#[derive(Default)]
struct EntryDraft {
    uuid: Option<EntryUuid>,
    group_id: Option<GroupId>,
    image: Option<u32>,
    title: Option<String>,
    url: String,
    username: String,
    password: String,
    comment: String,
    creation: Option<NaiveDateTime>,
    last_mod: Option<NaiveDateTime>,
    last_access: Option<NaiveDateTime>,
    expire: Option<NaiveDateTime>,
    binary_desc: String,
    binary: Vec<u8>,
}

impl EntryDraft {
    fn set(&mut self, ty: u16, d: &[u8]) -> Result<()> {
        use entry_field as f;
        match ty {
            f::UUID => {
                let b: [u8; 16] = d
                    .try_into()
                    .map_err(|_| anyhow!("entry uuid must be 16 bytes, got {}", d.len()))?;
                self.uuid = Some(EntryUuid(b));
            }
            f::GROUP_ID => self.group_id = Some(GroupId(le_u32(ty, d)?)),
            f::IMAGE => self.image = Some(le_u32(ty, d)?),
            f::TITLE => self.title = Some(read_cstr(ty, d)?),
            f::URL => self.url = read_cstr(ty, d)?,
            f::USERNAME => self.username = read_cstr(ty, d)?,
            f::PASSWORD => self.password = read_cstr(ty, d)?,
            f::COMMENT => self.comment = read_cstr(ty, d)?,
            f::CREATION => self.creation = read_time(ty, d)?,
            f::LAST_MOD => self.last_mod = read_time(ty, d)?,
            f::LAST_ACCESS => self.last_access = read_time(ty, d)?,
            f::EXPIRE => self.expire = read_time(ty, d)?,
            f::BINARY_DESC => self.binary_desc = read_cstr(ty, d)?,
            f::BINARY => self.binary = d.to_vec(),
            FIELD_IGNORE => {}
            other => debug!(field = other, "skipping unknown entry field"),
        }
        Ok(())
    }

    fn finish(self, index: usize) -> Result<Entry> {
        let missing = || anyhow!("invalid entry record #{index}: missing mandatory field");
        let e = Entry {
            uuid: self.uuid.ok_or_else(missing)?,
            group_id: self.group_id.ok_or_else(missing)?,
            image: self.image.ok_or_else(missing)?,
            title: self.title.ok_or_else(missing)?,
            url: self.url,
            username: self.username,
            password: self.password,
            comment: self.comment,
            creation: self.creation.ok_or_else(missing)?,
            last_mod: self.last_mod.ok_or_else(missing)?,
            last_access: self.last_access.ok_or_else(missing)?,
            expire: self.expire,
            binary_desc: self.binary_desc,
            binary: self.binary,
        };
        if !e.is_valid() {
            bail!("invalid entry {e}");
        }
        Ok(e)
    }
}

/// Decode `num_groups` group records then `num_entries` entry records and
/// rebuild the tree. Bytes after the last record are ignored.
pub fn decode_body(data: &[u8], num_groups: u32, num_entries: u32) -> Result<Root> {
    let mut fields = Fields { data, pos: 0 };

    let mut groups = Vec::new();
    let mut draft = GroupDraft::default();
    while groups.len() < num_groups as usize {
        let (ty, d) = fields.next_field()?;
        if ty == FIELD_END {
            groups.push(std::mem::take(&mut draft).finish(groups.len())?);
        } else {
            draft.set(ty, d)?;
        }
    }

    let mut entries = Vec::new();
    let mut draft = EntryDraft::default();
    while entries.len() < num_entries as usize {
        let (ty, d) = fields.next_field()?;
        if ty == FIELD_END {
            entries.push(std::mem::take(&mut draft).finish(entries.len())?);
        } else {
            draft.set(ty, d)?;
        }
    }

    debug!(groups = groups.len(), entries = entries.len(), bytes = fields.pos, "decoded body");
    Root::from_flat(groups, entries)
}
