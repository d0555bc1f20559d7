use anyhow::{Context, Result};
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// PCM layout of a WAV file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavSpec {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
}

impl WavSpec {
    /// What the Gemini TTS models return: mono, 16-bit, 24 kHz
    pub const GEMINI_TTS: WavSpec = WavSpec {
        channels: 1,
        sample_rate: 24_000,
        bits_per_sample: 16,
    };

    pub fn block_align(&self) -> u16 {
        self.channels * (self.bits_per_sample / 8)
    }

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * self.block_align() as u32
    }
}

/// 44-byte canonical RIFF/WAVE header for `data_len` bytes of PCM
pub fn wav_header(spec: WavSpec, data_len: u32) -> Vec<u8> {
    let mut header = Vec::with_capacity(44);

    // RIFF header
    header.extend_from_slice(b"RIFF");
    header.extend_from_slice(&(36 + data_len).to_le_bytes());
    header.extend_from_slice(b"WAVE");

    // fmt subchunk
    header.extend_from_slice(b"fmt ");
    header.extend_from_slice(&16u32.to_le_bytes()); // Subchunk1Size (16 for PCM)
    header.extend_from_slice(&1u16.to_le_bytes()); // AudioFormat (1 = PCM)
    header.extend_from_slice(&spec.channels.to_le_bytes());
    header.extend_from_slice(&spec.sample_rate.to_le_bytes());
    header.extend_from_slice(&spec.byte_rate().to_le_bytes());
    header.extend_from_slice(&spec.block_align().to_le_bytes());
    header.extend_from_slice(&spec.bits_per_sample.to_le_bytes());

    // data subchunk
    header.extend_from_slice(b"data");
    header.extend_from_slice(&data_len.to_le_bytes());

    header
}

/// Write raw little-endian PCM as a WAV file.
///
/// Trailing bytes that don't fill a whole frame are dropped. The file is
/// flushed and synced before this returns.
pub async fn write_wav(path: &Path, pcm: &[u8], spec: WavSpec) -> Result<()> {
    let frame = spec.block_align().max(1) as usize;
    let usable = pcm.len() - pcm.len() % frame;
    let data_len = u32::try_from(usable).context("PCM data too large for a WAV file")?;

    let mut file = tokio::fs::File::create(path)
        .await
        .with_context(|| format!("Failed to create {}", path.display()))?;

    file.write_all(&wav_header(spec, data_len)).await?;
    file.write_all(&pcm[..usable]).await?;
    file.flush().await?;
    file.sync_all()
        .await
        .with_context(|| format!("Failed to sync {}", path.display()))?;

    Ok(())
}
