use super::fixtures::{encode_ogg, raw_clip, write_file, ScriptedDecoder};
use crate::audio::backend::simulated::{HardwareCommand, SimulatedHardware};
use crate::audio::backend::SoundFlags;
use crate::audio::{AudioConfig, AudioError, AudioSystem, PlaybackState, Source};
use tempfile::TempDir;

fn system() -> AudioSystem<SimulatedHardware> {
    AudioSystem::new(AudioConfig::default(), SimulatedHardware::new()).unwrap()
}

fn write_wav(dir: &TempDir, name: &str, sample_rate: u32, samples: usize) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for i in 0..samples {
        writer.write_sample(i as i16).unwrap();
    }
    writer.finalize().unwrap();
    path
}

#[test]
fn test_rejects_invalid_config() {
    let mut config = AudioConfig::default();
    config.channel_count = 0;

    let result = AudioSystem::new(config, SimulatedHardware::new());
    assert!(matches!(result, Err(AudioError::Config(_))));
}

#[test]
fn test_raw_clip_plays_once_then_stops() {
    let dir = TempDir::new().unwrap();
    let path = write_file(dir.path(), "blip.raw", &raw_clip(256));
    let mut audio = system();

    let blip = audio.new_source(&path).unwrap();
    assert_eq!(audio.channels_in_use(), 1);
    assert_eq!(audio.state(blip), Some(PlaybackState::Idle));
    assert!(!audio.is_playing(blip));

    audio.play(blip).unwrap();
    assert!(audio.is_playing(blip));
    let channel = audio.source(blip).unwrap().channel().unwrap();
    let armed = audio.hardware().armed(channel).unwrap();
    assert_eq!(armed.size, 512);
    assert_eq!(armed.sample_rate, 44_100);
    assert!(armed.flags.contains(SoundFlags::ONE_SHOT));

    audio.hardware_mut().drain(channel);
    assert!(!audio.is_playing(blip));
    assert_eq!(audio.update(), 0);
    assert_eq!(audio.state(blip), Some(PlaybackState::Stopped));
}

#[test]
fn test_wav_clip_loops() {
    let dir = TempDir::new().unwrap();
    let path = write_wav(&dir, "loop.wav", 11_025, 100);
    let mut audio = system();

    let clip = audio.new_source(&path).unwrap();
    audio.set_looping(clip, true);
    assert!(audio.is_looping(clip));
    audio.play(clip).unwrap();

    let channel = audio.source(clip).unwrap().channel().unwrap();
    let armed = audio.hardware().armed(channel).unwrap().clone();
    assert_eq!(armed.size, 200);
    assert_eq!(armed.sample_rate, 22_050);
    assert!(armed.flags.contains(SoundFlags::REPEAT));

    audio.hardware_mut().drain(channel);
    audio.update();
    assert!(audio.is_playing(clip));
    assert_eq!(audio.state(clip), Some(PlaybackState::Playing));
}

#[test]
fn test_play_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let path = write_file(dir.path(), "blip.raw", &raw_clip(64));
    let mut audio = system();

    let blip = audio.new_source(&path).unwrap();
    audio.play(blip).unwrap();
    audio.play(blip).unwrap();

    let channel = audio.source(blip).unwrap().channel().unwrap();
    assert_eq!(audio.hardware().arm_count(channel), 1);
}

#[test]
fn test_play_while_sound_disabled() {
    let dir = TempDir::new().unwrap();
    let path = write_file(dir.path(), "blip.raw", &raw_clip(64));
    let mut audio = system();
    let blip = audio.new_source(&path).unwrap();

    audio.hardware_mut().set_available(false);
    let result = audio.play(blip);

    assert!(matches!(result, Err(AudioError::HardwareUnavailable(_))));
    assert!(audio.hardware().commands().is_empty());
    assert_eq!(audio.state(blip), Some(PlaybackState::Idle));
}

#[test]
fn test_stop_then_unload_twice() {
    let dir = TempDir::new().unwrap();
    let path = write_file(dir.path(), "blip.raw", &raw_clip(64));
    let mut audio = system();

    let blip = audio.new_source(&path).unwrap();
    audio.play(blip).unwrap();
    audio.stop(blip);
    audio.stop(blip);
    assert!(!audio.is_playing(blip));
    assert_eq!(audio.state(blip), Some(PlaybackState::Stopped));

    audio.unload(blip);
    audio.unload(blip);
    assert_eq!(audio.source_count(), 0);
    assert_eq!(audio.channels_in_use(), 0);

    assert!(matches!(audio.play(blip), Err(AudioError::InvalidHandle)));
    assert!(!audio.is_playing(blip));
    assert!(!audio.is_looping(blip));
    assert_eq!(audio.state(blip), None);
}

#[test]
fn test_unloaded_channel_is_reused() {
    let dir = TempDir::new().unwrap();
    let path = write_file(dir.path(), "blip.raw", &raw_clip(64));
    let mut config = AudioConfig::default();
    config.channel_count = 1;
    let mut audio = AudioSystem::new(config, SimulatedHardware::new()).unwrap();

    let first = audio.new_source(&path).unwrap();
    assert!(matches!(audio.new_source(&path), Err(AudioError::ChannelExhausted)));
    assert_eq!(audio.source_count(), 1);

    audio.unload(first);
    let second = audio.new_source(&path).unwrap();
    assert_ne!(first, second);
    assert_eq!(audio.channels_in_use(), 1);
}

#[test]
fn test_load_failures_hold_no_channel() {
    let dir = TempDir::new().unwrap();
    let not_ogg = write_file(dir.path(), "music.ogg", b"definitely not an ogg file");
    let mut corrupt = b"OggS".to_vec();
    corrupt.extend_from_slice(&[0xAB; 60]);
    let bad_headers = write_file(dir.path(), "broken.ogg", &corrupt);
    let text = write_file(dir.path(), "notes.txt", b"hello");
    let mut audio = system();

    assert!(matches!(audio.new_source(&not_ogg), Err(AudioError::UnsupportedFormat(_))));
    assert!(matches!(audio.new_source(&bad_headers), Err(AudioError::DecodeError(_))));
    assert!(matches!(audio.new_source(&text), Err(AudioError::UnsupportedFormat(_))));
    assert!(matches!(
        audio.new_source(dir.path().join("missing.wav")),
        Err(AudioError::NotFound(_))
    ));

    assert_eq!(audio.channels_in_use(), 0);
    assert_eq!(audio.source_count(), 0);
}

#[test]
fn test_stream_plays_to_end() {
    let mut audio = system();
    let decoder = ScriptedDecoder::new(4_000);
    let reads = decoder.read_counter();
    let music = audio.new_stream("music.ogg", Box::new(decoder)).unwrap();
    let reads_at_open = reads.get();

    let Some(Source::Streaming(stream)) = audio.source(music) else {
        panic!("expected a streaming source");
    };
    assert_eq!(stream.total_frames(), Some(2_000));
    assert!(stream.is_exhausted());
    let channel = stream.channel().unwrap();

    audio.play(music).unwrap();
    assert!(audio.is_playing(music));
    assert_eq!(audio.hardware().queued_slots(channel), vec![0, 1]);
    assert_eq!(audio.hardware().channel_format(channel).unwrap().channel_count, 2);

    audio.hardware_mut().drain(channel);
    assert_eq!(audio.update(), 0);
    assert!(!audio.is_playing(music));
    assert_eq!(audio.state(music), Some(PlaybackState::Stopped));

    // An exhausted stream issues no further decode work
    for _ in 0..5 {
        audio.update();
    }
    assert_eq!(reads.get(), reads_at_open);
}

#[test]
fn test_looping_set_before_play_keeps_short_stream_going() {
    let mut audio = system();
    let music = audio.new_stream("music.ogg", Box::new(ScriptedDecoder::new(4_000))).unwrap();
    audio.set_looping(music, true);
    audio.play(music).unwrap();
    let channel = audio.source(music).unwrap().channel().unwrap();
    assert_eq!(audio.hardware().queued_slots(channel), vec![0, 1, 2, 3]);

    for _ in 0..20 {
        audio.hardware_mut().consume_wave_buffer(channel);
        assert_eq!(audio.update(), 0);
        assert!(audio.is_playing(music));
        assert_eq!(audio.state(music), Some(PlaybackState::Playing));
    }
}

#[test]
fn test_ogg_file_streams_to_end() {
    let dir = TempDir::new().unwrap();
    let path = write_file(dir.path(), "theme.ogg", &encode_ogg(22_050));
    let mut audio = system();

    let theme = audio.new_source(&path).unwrap();
    let Some(Source::Streaming(stream)) = audio.source(theme) else {
        panic!("expected a streaming source");
    };
    assert_eq!(stream.channels(), 2);
    assert_eq!(stream.sample_rate(), 44_100);
    let channel = stream.channel().unwrap();

    audio.play(theme).unwrap();
    for _ in 0..100 {
        if audio.state(theme) == Some(PlaybackState::Stopped) {
            break;
        }
        audio.hardware_mut().consume_wave_buffer(channel);
        assert_eq!(audio.update(), 0);
    }
    assert_eq!(audio.state(theme), Some(PlaybackState::Stopped));
    assert!(!audio.is_playing(theme));
}

#[test]
fn test_ogg_file_loops_past_its_end() {
    let dir = TempDir::new().unwrap();
    let path = write_file(dir.path(), "theme.ogg", &encode_ogg(22_050));
    let mut audio = system();

    let theme = audio.new_source(&path).unwrap();
    let channel = audio.source(theme).unwrap().channel().unwrap();
    audio.set_looping(theme, true);
    audio.play(theme).unwrap();

    // 44100 samples fill about 15 slots, so this wraps the stream twice
    for _ in 0..40 {
        audio.hardware_mut().consume_wave_buffer(channel);
        assert_eq!(audio.update(), 0);
        assert!(audio.is_playing(theme));
    }
    assert_eq!(audio.state(theme), Some(PlaybackState::Playing));
}

#[test]
fn test_looping_resumes_exhausted_stream() {
    let mut audio = system();
    let music = audio.new_stream("music.ogg", Box::new(ScriptedDecoder::new(4_000))).unwrap();
    audio.play(music).unwrap();
    let channel = audio.source(music).unwrap().channel().unwrap();

    audio.set_looping(music, true);
    audio.update();

    assert_eq!(audio.hardware().queued_slots(channel), vec![0, 1, 2]);
    let restarted = audio.hardware().queued_samples(channel, 2).unwrap();
    assert_eq!(&restarted[..3], &[0, 1, 2]);
    assert!(audio.is_playing(music));
}

#[test]
fn test_stream_stop_clears_queue() {
    let mut audio = system();
    let music = audio.new_stream("music.ogg", Box::new(ScriptedDecoder::new(100_000))).unwrap();
    audio.play(music).unwrap();
    let channel = audio.source(music).unwrap().channel().unwrap();
    assert_eq!(audio.hardware().queued_slots(channel).len(), 4);

    audio.stop(music);
    assert!(!audio.is_playing(music));
    assert!(audio.hardware().queued_slots(channel).is_empty());
    assert!(audio
        .hardware()
        .commands()
        .contains(&HardwareCommand::ClearChannel { channel }));

    audio.play(music).unwrap();
    let replayed = audio.hardware().queued_samples(channel, 0).unwrap();
    assert_eq!(replayed[0], 0);
}

#[test]
fn test_shutdown_releases_everything() {
    let dir = TempDir::new().unwrap();
    let path = write_file(dir.path(), "blip.raw", &raw_clip(64));
    let mut audio = system();

    let blip = audio.new_source(&path).unwrap();
    audio.new_stream("music.ogg", Box::new(ScriptedDecoder::new(8_000))).unwrap();
    audio.play(blip).unwrap();
    assert_eq!(audio.channels_in_use(), 2);

    audio.shutdown();
    assert_eq!(audio.source_count(), 0);
    assert_eq!(audio.channels_in_use(), 0);
    assert_eq!(audio.channels().available(), audio.channels().capacity());
}
