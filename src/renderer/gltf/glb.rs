//! Splitting a binary glTF container into its JSON and BIN chunks.

use bytemuck::{Pod, Zeroable};

use crate::renderer::gltf::LoadError;

const MAGIC: u32 = 0x4654_6C67; // "glTF"
const CHUNK_JSON: u32 = 0x4E4F_534A; // "JSON"
const CHUNK_BIN: u32 = 0x004E_4942; // "BIN\0"

#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C)]
struct Header {
    magic: u32,
    version: u32,
    length: u32,
}

#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C)]
struct ChunkHeader {
    length: u32,
    chunk_type: u32,
}

pub struct Glb<'a> {
    pub json: &'a str,
    pub bin: Option<&'a [u8]>,
}

pub fn is_glb(bytes: &[u8]) -> bool {
    bytes.len() >= 4 && bytes[..4] == MAGIC.to_le_bytes()
}

impl<'a> Glb<'a> {
    pub fn split(bytes: &'a [u8]) -> Result<Glb<'a>, LoadError> {
        let header: Header = read(bytes, 0).ok_or(LoadError::Glb("truncated header"))?;
        if u32::from_le(header.magic) != MAGIC {
            return Err(LoadError::Glb("bad magic"));
        }
        if u32::from_le(header.version) != 2 {
            return Err(LoadError::Glb("unsupported container version"));
        }
        let length = u32::from_le(header.length) as usize;
        if length > bytes.len() {
            return Err(LoadError::Glb("declared length exceeds file size"));
        }
        let bytes = &bytes[..length];

        let mut json = None;
        let mut bin = None;
        let mut offset = std::mem::size_of::<Header>();
        while offset < bytes.len() {
            let chunk: ChunkHeader =
                read(bytes, offset).ok_or(LoadError::Glb("truncated chunk header"))?;
            let start = offset + std::mem::size_of::<ChunkHeader>();
            let end = start + u32::from_le(chunk.length) as usize;
            let data = bytes
                .get(start..end)
                .ok_or(LoadError::Glb("chunk runs past the end of the file"))?;
            match u32::from_le(chunk.chunk_type) {
                CHUNK_JSON if json.is_none() => {
                    let text = std::str::from_utf8(data)
                        .map_err(|_| LoadError::Glb("JSON chunk is not UTF-8"))?;
                    // Padding is spaces, but some exporters pad with NULs.
                    json = Some(text.trim_end_matches([' ', '\0']));
                }
                CHUNK_BIN if bin.is_none() => bin = Some(data),
                // Unknown chunks must be ignored.
                _ => {}
            }
            // Chunks are padded to 4 bytes.
            offset = (end + 3) & !3;
        }

        let json = json.ok_or(LoadError::Glb("missing JSON chunk"))?;
        Ok(Glb { json, bin })
    }
}

fn read<T: Pod>(bytes: &[u8], offset: usize) -> Option<T> {
    let end = offset.checked_add(std::mem::size_of::<T>())?;
    bytes.get(offset..end).map(bytemuck::pod_read_unaligned)
}

#[cfg(test)]
pub(crate) fn build(json: &str, bin: &[u8]) -> Vec<u8> {
    fn chunk(out: &mut Vec<u8>, chunk_type: u32, data: &[u8], pad: u8) {
        let padded = (data.len() + 3) & !3;
        out.extend_from_slice(&(padded as u32).to_le_bytes());
        out.extend_from_slice(&chunk_type.to_le_bytes());
        out.extend_from_slice(data);
        out.resize(out.len() + padded - data.len(), pad);
    }
    let mut body = Vec::new();
    chunk(&mut body, CHUNK_JSON, json.as_bytes(), b' ');
    chunk(&mut body, CHUNK_BIN, bin, 0);
    let mut out = Vec::new();
    out.extend_from_slice(&MAGIC.to_le_bytes());
    out.extend_from_slice(&2u32.to_le_bytes());
    out.extend_from_slice(&(12 + body.len() as u32).to_le_bytes());
    out.extend_from_slice(&body);
    out
}
