//! Audio decoding module
//!
//! Uses symphonia for decoding multiple formats:
//! - WAV, AIFF (PCM)
//! - FLAC, ALAC (lossless)
//! - MP3, OGG Vorbis, AAC (lossy)
//!
//! Decoded audio is mixed down to mono f32 at the file's native rate.

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::AudioBuffer;
use crate::error::{AudioError, AudioResult};

// ═══════════════════════════════════════════════════════════════════════════════
// DECODER
// ═══════════════════════════════════════════════════════════════════════════════

/// Universal audio decoder using symphonia
pub struct AudioDecoder;

impl AudioDecoder {
    /// Decode an audio file to a mono buffer
    pub fn decode(path: &Path) -> AudioResult<AudioBuffer> {
        if !path.exists() {
            return Err(AudioError::InputNotFound(path.display().to_string()));
        }

        let file = File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        // Create hint from file extension
        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| AudioError::ReadError(format!("Failed to probe format: {}", e)))?;

        let mut format = probed.format;

        // Find first audio track
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| AudioError::ReadError("No audio track found".to_string()))?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();
        let sample_rate = codec_params
            .sample_rate
            .ok_or_else(|| AudioError::ReadError("Unknown sample rate".to_string()))?;

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| AudioError::ReadError(format!("Failed to create decoder: {}", e)))?;

        let mut mono: Vec<f32> = Vec::new();
        let mut sample_buf: Option<SampleBuffer<f32>> = None;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    // End of stream
                    break;
                }
                Err(e) => {
                    return Err(AudioError::ReadError(format!("Packet read error: {}", e)));
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    let channels = spec.channels.count().max(1);

                    let buf = sample_buf.get_or_insert_with(|| {
                        SampleBuffer::<f32>::new(decoded.capacity() as u64, spec)
                    });
                    if buf.capacity() < decoded.capacity() * channels {
                        *buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                    }
                    buf.copy_interleaved_ref(decoded);

                    let frames = AudioBuffer::from_interleaved(buf.samples(), channels, sample_rate);
                    mono.extend_from_slice(&frames.samples);
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    // Corrupt packet, keep going
                    log::warn!("Skipping undecodable packet in {}: {}", path.display(), e);
                    continue;
                }
                Err(e) => {
                    return Err(AudioError::ReadError(format!("Decode error: {}", e)));
                }
            }
        }

        log::debug!(
            "Decoded {} ({} samples @ {} Hz)",
            path.display(),
            mono.len(),
            sample_rate
        );

        Ok(AudioBuffer::new(mono, sample_rate))
    }

    /// File extensions the decoder accepts
    pub fn supported_formats() -> &'static [&'static str] {
        &["wav", "flac", "mp3", "ogg", "aac", "m4a", "aiff", "aif"]
    }

    /// Whether a path has a supported extension
    pub fn is_supported(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| {
                let ext = ext.to_ascii_lowercase();
                Self::supported_formats().contains(&ext.as_str())
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, channels: u16, sample_rate: u32, frames: &[Vec<f32>]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for frame in frames {
            for &sample in frame {
                writer
                    .write_sample((sample * i16::MAX as f32) as i16)
                    .unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_decode_mono_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let frames: Vec<Vec<f32>> = (0..4000)
            .map(|i| vec![(2.0 * std::f32::consts::PI * 220.0 * i as f32 / 16000.0).sin() * 0.5])
            .collect();
        write_wav(&path, 1, 16000, &frames);

        let audio = AudioDecoder::decode(&path).unwrap();
        assert_eq!(audio.sample_rate, 16000);
        assert_eq!(audio.len(), 4000);
        assert!(audio.samples.iter().all(|s| s.abs() <= 0.51));
    }

    #[test]
    fn test_decode_stereo_is_mixed_down() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let frames: Vec<Vec<f32>> = (0..1000).map(|_| vec![0.5, -0.5]).collect();
        write_wav(&path, 2, 8000, &frames);

        let audio = AudioDecoder::decode(&path).unwrap();
        assert_eq!(audio.len(), 1000);
        assert!(audio.samples.iter().all(|s| s.abs() < 1e-3));
    }

    #[test]
    fn test_missing_file() {
        let err = AudioDecoder::decode(Path::new("/nonexistent/audio.wav")).unwrap_err();
        assert!(matches!(err, AudioError::InputNotFound(_)));
    }

    #[test]
    fn test_supported_formats() {
        let formats = AudioDecoder::supported_formats();
        assert!(formats.contains(&"wav"));
        assert!(formats.contains(&"flac"));
        assert!(AudioDecoder::is_supported(Path::new("voice.WAV")));
        assert!(!AudioDecoder::is_supported(Path::new("notes.txt")));
        assert!(!AudioDecoder::is_supported(Path::new("noext")));
    }
}
