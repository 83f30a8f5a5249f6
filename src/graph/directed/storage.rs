//! Binary save/load of [`DirectedGraph`].
//!
//! Layout (native endianness and width throughout):
//!
//! ```text
//! tag: u8                      0 = plain, 1 = compressed
//! node_num: u32, edge_num: u64
//! plain:      out_offsets[n+1], in_offsets[n+1], bi_degree[n], out_nbrs[m], in_nbrs[m]
//! compressed: out_degree[n], in_degree[n], bi_degree[n] (u32 each),
//!             out_bytes: u64, out_buf[out_bytes], in_bytes: u64, in_buf[in_bytes]
//! labels:     flag: u8, then if 1: bytes: u64, NUL-terminated strings
//! edge attrs: flag: u8, then if 1: width: u32, out_attrs[m], in_attrs[m]
//! ```
//!
//! In the compressed body every node contributes its mutual partition and
//! then its one-directional partition, each through
//! [`encode_increasing`](super::codec::encode_increasing).

use std::io::{Read, Write};

use zerocopy::{AsBytes, FromBytes};

use super::codec::{decode_increasing, encode_increasing};
use super::{DirectedGraph, EdgeAttrs, NodeId};
use crate::error::{Error, Result};
use crate::io::chunked::{read_value, read_vec, write_chunked, write_value};

/// On-disk body encoding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum GraphFormat {
    /// Raw offset and neighbor arrays.
    Plain,
    /// Degree arrays plus delta/varint coded neighbor runs.
    #[default]
    Compressed,
}

impl GraphFormat {
    const fn tag(self) -> u8 {
        match self {
            GraphFormat::Plain => 0,
            GraphFormat::Compressed => 1,
        }
    }

    fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(GraphFormat::Plain),
            1 => Ok(GraphFormat::Compressed),
            other => Err(Error::UnknownFormat(other)),
        }
    }
}

impl<E: AsBytes> DirectedGraph<E> {
    /// Serializes the graph, its labels and its edge attributes.
    ///
    /// # Errors
    /// [`Error::Io`] from the writer, or [`Error::Corrupt`] if a label
    /// contains a NUL byte.
    pub fn save<W: Write>(&self, writer: &mut W, format: GraphFormat) -> Result<()> {
        write_value(writer, &format.tag())?;
        write_value(writer, &self.node_num)?;
        write_value(writer, &self.edge_num)?;
        match format {
            GraphFormat::Plain => {
                write_chunked(writer, &self.out_offsets)?;
                write_chunked(writer, &self.in_offsets)?;
                write_chunked(writer, &self.bi_degrees)?;
                write_chunked(writer, &self.out_nbrs)?;
                write_chunked(writer, &self.in_nbrs)?;
            }
            GraphFormat::Compressed => {
                let out_degrees: Vec<u32> = (0..self.node_num).map(|u| self.out_degree(u)).collect();
                let in_degrees: Vec<u32> = (0..self.node_num).map(|u| self.in_degree(u)).collect();
                write_chunked(writer, &out_degrees)?;
                write_chunked(writer, &in_degrees)?;
                write_chunked(writer, &self.bi_degrees)?;
                for side in [Self::out_neighbors, Self::in_neighbors] {
                    let buf = self.encode_side(side);
                    write_value(writer, &(buf.len() as u64))?;
                    write_chunked(writer, &buf)?;
                }
            }
        }

        match &self.labels {
            Some(labels) => {
                if labels.iter().any(|l| l.as_bytes().contains(&0)) {
                    return Err(Error::Corrupt("label contains a NUL byte"));
                }
                let mut buf = Vec::with_capacity(labels.iter().map(|l| l.len() + 1).sum());
                for label in labels {
                    buf.extend_from_slice(label.as_bytes());
                    buf.push(0);
                }
                write_value(writer, &1u8)?;
                write_value(writer, &(buf.len() as u64))?;
                write_chunked(writer, &buf)?;
            }
            None => write_value(writer, &0u8)?,
        }

        match &self.edge_attrs {
            Some(attrs) => {
                write_value(writer, &1u8)?;
                write_value(writer, &(core::mem::size_of::<E>() as u32))?;
                write_chunked(writer, &attrs.out)?;
                write_chunked(writer, &attrs.inc)?;
            }
            None => write_value(writer, &0u8)?,
        }
        writer.flush()?;
        Ok(())
    }

    fn encode_side(&self, side: fn(&Self, NodeId) -> &[NodeId]) -> Vec<u8> {
        let mut buf = Vec::new();
        for u in 0..self.node_num {
            let (mutual, single) = side(self, u).split_at(self.bi_degree(u) as usize);
            encode_increasing(&mut buf, mutual);
            encode_increasing(&mut buf, single);
        }
        buf
    }
}

impl<E: AsBytes + FromBytes + Copy> DirectedGraph<E> {
    /// Deserializes a graph written by [`save`](Self::save) in either format.
    ///
    /// The decoded structure is checked with [`verify`](Self::verify) before
    /// it is returned.
    ///
    /// # Errors
    /// [`Error::UnknownFormat`], [`Error::Truncated`], [`Error::Corrupt`] or
    /// [`Error::AttrLayout`] on malformed input.
    pub fn load<R: Read>(reader: &mut R) -> Result<Self> {
        let format = GraphFormat::from_tag(read_value(reader, "format tag")?)?;
        let node_num: u32 = read_value(reader, "node count")?;
        let edge_num: u64 = read_value(reader, "edge count")?;
        let n = node_num as usize;
        let m = usize::try_from(edge_num).map_err(|_| Error::Corrupt("edge count exceeds address space"))?;

        let mut graph = match format {
            GraphFormat::Plain => {
                let out_offsets = read_vec(reader, n + 1, "out offsets")?;
                let in_offsets = read_vec(reader, n + 1, "in offsets")?;
                if out_offsets.last() != Some(&edge_num) || in_offsets.last() != Some(&edge_num) {
                    return Err(Error::Corrupt("offsets do not span the edge array"));
                }
                let bi_degrees = read_vec(reader, n, "bi degrees")?;
                let out_nbrs = read_vec(reader, m, "out neighbors")?;
                let in_nbrs = read_vec(reader, m, "in neighbors")?;
                Self {
                    node_num,
                    edge_num,
                    out_offsets,
                    in_offsets,
                    bi_degrees,
                    out_nbrs,
                    in_nbrs,
                    edge_attrs: None,
                    labels: None,
                }
            }
            GraphFormat::Compressed => {
                let out_degrees: Vec<u32> = read_vec(reader, n, "out degrees")?;
                let in_degrees: Vec<u32> = read_vec(reader, n, "in degrees")?;
                let bi_degrees: Vec<u32> = read_vec(reader, n, "bi degrees")?;
                let out_offsets = prefix_offsets(&out_degrees, edge_num)?;
                let in_offsets = prefix_offsets(&in_degrees, edge_num)?;
                let out_nbrs = decode_side(reader, &out_offsets, &bi_degrees, "out neighbor bytes")?;
                let in_nbrs = decode_side(reader, &in_offsets, &bi_degrees, "in neighbor bytes")?;
                Self {
                    node_num,
                    edge_num,
                    out_offsets,
                    in_offsets,
                    bi_degrees,
                    out_nbrs,
                    in_nbrs,
                    edge_attrs: None,
                    labels: None,
                }
            }
        };

        if read_value::<_, u8>(reader, "label flag")? != 0 {
            let len: u64 = read_value(reader, "label bytes")?;
            let len = usize::try_from(len).map_err(|_| Error::Corrupt("label section too large"))?;
            let buf: Vec<u8> = read_vec(reader, len, "labels")?;
            graph.labels = Some(split_labels(&buf, n)?);
        }

        if read_value::<_, u8>(reader, "edge attribute flag")? != 0 {
            let width: u32 = read_value(reader, "edge attribute width")?;
            let expected = core::mem::size_of::<E>();
            if width as usize != expected {
                return Err(Error::AttrLayout {
                    expected,
                    found: width as usize,
                });
            }
            let out = read_vec(reader, m, "out edge attributes")?;
            let inc = read_vec(reader, m, "in edge attributes")?;
            graph.edge_attrs = Some(EdgeAttrs { out, inc });
        }

        graph.verify()?;
        Ok(graph)
    }

    /// Replaces `self` with the graph read from `reader`.
    ///
    /// On failure the graph is left empty.
    ///
    /// # Errors
    /// Same as [`load`](Self::load).
    pub fn reload<R: Read>(&mut self, reader: &mut R) -> Result<()> {
        match Self::load(reader) {
            Ok(graph) => {
                *self = graph;
                Ok(())
            }
            Err(e) => {
                self.clear();
                Err(e)
            }
        }
    }
}

fn prefix_offsets(degrees: &[u32], edge_num: u64) -> Result<Vec<u64>> {
    let mut offsets = Vec::with_capacity(degrees.len() + 1);
    let mut acc = 0u64;
    offsets.push(acc);
    for &d in degrees {
        acc += u64::from(d);
        offsets.push(acc);
    }
    if acc == edge_num {
        Ok(offsets)
    } else {
        Err(Error::Corrupt("degrees do not sum to the edge count"))
    }
}

fn decode_side<R: Read>(
    reader: &mut R,
    offsets: &[u64],
    bi_degrees: &[u32],
    section: &'static str,
) -> Result<Vec<NodeId>> {
    let len: u64 = read_value(reader, section)?;
    let len = usize::try_from(len).map_err(|_| Error::Corrupt("neighbor buffer too large"))?;
    let buf: Vec<u8> = read_vec(reader, len, section)?;

    // Every encoded id takes at least one byte.
    let total = offsets.last().copied().unwrap_or(0);
    if total > buf.len() as u64 {
        return Err(Error::Corrupt("neighbor buffer shorter than its runs"));
    }
    let mut nbrs = vec![0 as NodeId; total as usize];
    let mut pos = 0usize;
    for (u, &bi) in bi_degrees.iter().enumerate() {
        let run = &mut nbrs[offsets[u] as usize..offsets[u + 1] as usize];
        if bi as usize > run.len() {
            return Err(Error::Corrupt("bi-degree exceeds degree"));
        }
        let (mutual, single) = run.split_at_mut(bi as usize);
        for part in [mutual, single] {
            pos += decode_increasing(&buf[pos..], part).ok_or(Error::Corrupt("neighbor run"))?;
        }
    }
    if pos == buf.len() {
        Ok(nbrs)
    } else {
        Err(Error::Corrupt("trailing bytes after neighbor runs"))
    }
}

fn split_labels(buf: &[u8], node_num: usize) -> Result<Vec<String>> {
    let labels: Vec<String> = if buf.is_empty() {
        Vec::new()
    } else {
        buf.strip_suffix(&[0])
            .ok_or(Error::Corrupt("unterminated label"))?
            .split(|&b| b == 0)
            .map(|raw| String::from_utf8_lossy(raw).into_owned())
            .collect()
    };
    if labels.len() == node_num {
        Ok(labels)
    } else {
        Err(Error::Corrupt("label count"))
    }
}
