//! Safetensors I/O for stored recordings.
//!
//! A recording file holds:
//!
//! | key        | dtype | shape   | content                          |
//! |------------|-------|---------|----------------------------------|
//! | `data`     | F32   | [C, T]  | samples, channel-major           |
//! | `sfreq`    | F32   | [1]     | sampling rate in Hz              |
//! | `ch_names` | U8    | [n]     | optional, `\n`-separated names   |
use anyhow::{bail, ensure, Context, Result};
use ndarray::Array2;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

type Header = HashMap<String, serde_json::Value>;

// ── Low-level safetensors parsing ────────────────────────────────────────────

fn parse_header(bytes: &[u8]) -> Result<(Header, usize)> {
    ensure!(bytes.len() >= 8, "safetensors file too small");
    let mut len = [0u8; 8];
    len.copy_from_slice(&bytes[..8]);
    let n = u64::from_le_bytes(len) as usize;
    let end = 8usize.checked_add(n).context("header length overflows")?;
    ensure!(end <= bytes.len(), "header length {n} runs past end of file");
    let header: Header =
        serde_json::from_slice(&bytes[8..end]).context("failed to parse safetensors header")?;
    Ok((header, end))
}

fn tensor_bytes<'a>(
    bytes: &'a [u8],
    data_start: usize,
    name: &str,
    entry: &serde_json::Value,
) -> Result<&'a [u8]> {
    let offsets = entry["data_offsets"]
        .as_array()
        .with_context(|| format!("'{name}' has no data_offsets"))?;
    let (s, e) = match offsets.as_slice() {
        [s, e] => (
            s.as_u64().context("bad offset")? as usize,
            e.as_u64().context("bad offset")? as usize,
        ),
        _ => bail!("'{name}' data_offsets must have two entries"),
    };
    ensure!(s <= e, "'{name}' has inverted offsets");
    bytes
        .get(data_start + s..data_start + e)
        .with_context(|| format!("'{name}' runs past end of file"))
}

fn read_f32_tensor(
    bytes: &[u8],
    data_start: usize,
    name: &str,
    entry: &serde_json::Value,
) -> Result<Vec<f32>> {
    ensure!(entry["dtype"] == "F32", "'{name}' must be F32, found {}", entry["dtype"]);
    let raw = tensor_bytes(bytes, data_start, name, entry)?;
    Ok(raw
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

fn shape_of(name: &str, entry: &serde_json::Value) -> Result<Vec<usize>> {
    entry["shape"]
        .as_array()
        .with_context(|| format!("'{name}' has no shape"))?
        .iter()
        .map(|v| v.as_u64().map(|d| d as usize).context("bad shape entry"))
        .collect()
}

// ── Recording ────────────────────────────────────────────────────────────────

/// A multichannel recording that can be replayed as a stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    /// [C, T] samples.
    pub data: Array2<f64>,
    /// Sampling rate (Hz).
    pub sfreq: f64,
    /// Channel names (may be empty).
    pub ch_names: Vec<String>,
}

impl Recording {
    pub fn n_channels(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_samples(&self) -> usize {
        self.data.ncols()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let (header, data_start) = parse_header(&bytes)?;

        let data_entry = header.get("data").context("missing 'data' key")?;
        let shape = shape_of("data", data_entry)?;
        let &[c, t] = shape.as_slice() else {
            bail!("'data' must be 2-D, got shape {shape:?}");
        };
        let values = read_f32_tensor(&bytes, data_start, "data", data_entry)?;
        let data = Array2::from_shape_vec((c, t), values)
            .context("'data' size does not match its shape")?
            .mapv(f64::from);

        let sfreq_entry = header.get("sfreq").context("missing 'sfreq' key")?;
        let sfreq = read_f32_tensor(&bytes, data_start, "sfreq", sfreq_entry)?
            .first()
            .copied()
            .context("'sfreq' is empty")? as f64;
        ensure!(sfreq.is_finite() && sfreq > 0.0, "invalid sampling rate {sfreq}");

        let ch_names = match header.get("ch_names") {
            Some(e) => {
                let raw = tensor_bytes(&bytes, data_start, "ch_names", e)?;
                std::str::from_utf8(raw)?
                    .split('\n')
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            }
            None => vec![],
        };

        Ok(Recording { data, sfreq, ch_names })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let data: Vec<u8> = self.data.iter().flat_map(|&v| (v as f32).to_le_bytes()).collect();
        let sfreq = (self.sfreq as f32).to_le_bytes().to_vec();
        let mut tensors = vec![
            ("data", "F32", vec![self.n_channels(), self.n_samples()], data),
            ("sfreq", "F32", vec![1], sfreq),
        ];
        if !self.ch_names.is_empty() {
            let names = self.ch_names.join("\n").into_bytes();
            tensors.push(("ch_names", "U8", vec![names.len()], names));
        }

        let mut header = serde_json::Map::new();
        let mut offset = 0usize;
        for (name, dtype, shape, bytes) in &tensors {
            header.insert(
                name.to_string(),
                serde_json::json!({
                    "dtype": dtype,
                    "shape": shape,
                    "data_offsets": [offset, offset + bytes.len()],
                }),
            );
            offset += bytes.len();
        }
        let mut hdr = serde_json::to_vec(&header)?;
        let pad = (8 - hdr.len() % 8) % 8;
        hdr.extend(std::iter::repeat(b' ').take(pad));

        let mut f = std::fs::File::create(path)
            .with_context(|| format!("creating {}", path.display()))?;
        f.write_all(&(hdr.len() as u64).to_le_bytes())?;
        f.write_all(&hdr)?;
        for (_, _, _, bytes) in &tensors {
            f.write_all(bytes)?;
        }
        Ok(())
    }
}
