use parking_lot::Mutex;
use sightread::timing::ManualClock;
use sightread::{
    EventKind, EventScheduler, MelodyNote, MelodyPlayer, MetronomePlayer, PlaybackConfig,
    Progress, RecordingSink, SchedulerConfig,
};
use std::sync::Arc;

const EPS: f64 = 1e-9;

fn recording_sink(start: f64) -> Arc<RecordingSink> {
    Arc::new(RecordingSink::new(start))
}

/// Advance the fake clock in `step` increments, ticking after each one.
fn drive(sink: &RecordingSink, tick: impl Fn() -> usize, step: f64, until: f64) {
    tick();
    while sink.now() < until {
        sink.advance(step);
        tick();
    }
}

#[test]
fn triad_at_sixty_bpm() {
    let sink = recording_sink(5.0);
    let mut melody = MelodyPlayer::new(sink.clone(), &PlaybackConfig::host_driven());
    let progress = Arc::new(Mutex::new(Vec::<Progress>::new()));
    let log = progress.clone();
    melody.on_progress(move |p| log.lock().push(p));

    melody.load_melody(vec![
        MelodyNote::new("C4", 0.0, 1.0),
        MelodyNote::new("E4", 1.0, 1.0),
        MelodyNote::new("G4", 2.0, 1.0),
    ]);
    melody.start(60.0).unwrap();
    drive(&sink, || melody.tick(), 0.025, 9.0);

    let voices = sink.voices();
    assert_eq!(voices.len(), 3);
    for (n, (voice, hz)) in voices.iter().zip([261.63, 329.63, 392.0]).enumerate() {
        assert!((voice.start - (5.0 + n as f64)).abs() < EPS);
        assert!((voice.gain.end_time().unwrap() - voice.start - 1.0).abs() < EPS);
        assert!((voice.frequency - hz).abs() < 0.01);
    }

    let progress = progress.lock();
    assert_eq!(progress.len(), 4);
    assert!((progress[0].percent - 33.333).abs() < 0.01);
    assert!((progress[1].percent - 66.667).abs() < 0.01);
    assert_eq!(progress[2].percent, 100.0);
    assert_eq!(progress[2].note_index, Some(2));
    assert_eq!(progress[3].note_index, None);
    assert!(!melody.is_running());
}

#[test]
fn unknown_pitch_skips_only_that_tone() {
    let sink = recording_sink(0.0);
    let mut melody = MelodyPlayer::new(sink.clone(), &PlaybackConfig::host_driven());
    let notes_heard = Arc::new(Mutex::new(Vec::new()));
    let last_percent = Arc::new(Mutex::new(0.0));

    let heard = notes_heard.clone();
    melody.on_note(move |note, _| heard.lock().push(note.pitch.clone()));
    let percent = last_percent.clone();
    melody.on_progress(move |p| {
        if !p.is_idle() {
            *percent.lock() = p.percent;
        }
    });

    melody.load_melody(vec![
        MelodyNote::new("C4", 0.0, 1.0),
        MelodyNote::new("H4", 1.0, 1.0),
        MelodyNote::new("D4", 2.0, 1.0),
        MelodyNote::new("E4", 3.0, 1.0),
    ]);
    melody.start(120.0).unwrap();
    drive(&sink, || melody.tick(), 0.025, 3.0);

    assert_eq!(sink.voice_count(), 3);
    assert_eq!(notes_heard.lock().len(), 4);
    assert_eq!(*last_percent.lock(), 100.0);
    assert!(!melody.is_running());
}

#[test]
fn load_order_does_not_matter() {
    let sink = recording_sink(0.0);
    let mut melody = MelodyPlayer::new(sink.clone(), &PlaybackConfig::host_driven());
    melody.load_melody(vec![
        MelodyNote::new("B4", 3.0, 0.5),
        MelodyNote::new("C4", 0.0, 0.5),
        MelodyNote::new("A4", 2.5, 0.5),
        MelodyNote::new("D4", 0.5, 0.5),
    ]);
    melody.start(60.0).unwrap();
    drive(&sink, || melody.tick(), 0.05, 5.0);

    let starts: Vec<f64> = sink.voices().iter().map(|v| v.start).collect();
    assert_eq!(starts, vec![0.0, 0.5, 2.5, 3.0]);
}

#[test]
fn stop_before_anything_is_due() {
    let sink = recording_sink(0.0);
    let mut melody = MelodyPlayer::new(sink.clone(), &PlaybackConfig::host_driven());
    let calls = Arc::new(Mutex::new(0));
    let count = calls.clone();
    melody.on_note(move |_, _| *count.lock() += 1);
    melody.load_melody(vec![MelodyNote::new("C4", 1.0, 1.0)]);

    melody.start(60.0).unwrap();
    melody.stop();
    drive(&sink, || melody.tick(), 0.025, 3.0);

    assert_eq!(*calls.lock(), 0);
    assert_eq!(sink.voice_count(), 0);
}

#[test]
fn metronome_downbeats_in_four_four() {
    let sink = recording_sink(0.0);
    let mut metronome = MetronomePlayer::new(sink.clone(), &PlaybackConfig::host_driven());
    let beats = Arc::new(Mutex::new(Vec::new()));
    let log = beats.clone();
    metronome.on_beat(move |beat, downbeat| log.lock().push((beat, downbeat)));

    metronome.start(120.0, 4).unwrap();
    drive(&sink, || metronome.tick(), 0.025, 5.7);
    metronome.stop();

    let beats = beats.lock();
    assert_eq!(beats.len(), 12);
    let downbeats: Vec<u64> = beats.iter().filter(|(_, d)| *d).map(|(b, _)| *b).collect();
    assert_eq!(downbeats, vec![0, 4, 8]);

    let accented = sink
        .voices()
        .iter()
        .filter(|v| v.frequency == 1200.0)
        .count();
    assert_eq!(accented, 3);
}

#[test]
fn metronome_spacing_survives_jittery_ticks() {
    let sink = recording_sink(2.0);
    let mut metronome = MetronomePlayer::new(sink.clone(), &PlaybackConfig::host_driven());
    metronome.start(120.0, 4).unwrap();
    metronome.tick();

    let jitter = [0.013, 0.041, 0.007, 0.09, 0.022, 0.035, 0.004, 0.06];
    for step in jitter.iter().cycle().take(400) {
        sink.advance(*step);
        metronome.tick();
    }
    metronome.stop();

    let starts: Vec<f64> = sink.voices().iter().map(|v| v.start).collect();
    assert!(starts.len() > 20);
    assert_eq!(starts[0], 2.0);
    for pair in starts.windows(2) {
        assert!((pair[1] - pair[0] - 0.5).abs() < EPS);
    }
}

#[test]
fn cancel_removes_only_that_event() {
    let clock = Arc::new(ManualClock::new(0.0));
    let scheduler = EventScheduler::new(clock.clone(), SchedulerConfig::host_driven());
    let fired = Arc::new(Mutex::new(Vec::new()));
    scheduler.start();

    let ids: Vec<_> = (0..3)
        .map(|n| {
            let fired = fired.clone();
            scheduler.schedule_event(1.0 + n as f64 * 0.1, EventKind::Note, move || {
                fired.lock().push(n)
            })
        })
        .collect();

    assert!(scheduler.cancel_event(ids[1]));
    assert!(!scheduler.cancel_event(ids[1]));

    clock.set(2.0);
    assert_eq!(scheduler.tick(), 2);
    assert_eq!(*fired.lock(), vec![0, 2]);
}

#[test]
fn melody_and_metronome_share_one_sink() {
    let sink = recording_sink(0.0);
    let config = PlaybackConfig::host_driven();
    let mut melody = MelodyPlayer::new(sink.clone(), &config);
    let mut metronome = MetronomePlayer::new(sink.clone(), &config);

    melody.load_melody(vec![MelodyNote::new("A4", 0.0, 2.0)]);
    melody.start(120.0).unwrap();
    metronome.start(120.0, 2).unwrap();
    drive(
        &sink,
        || melody.tick() + metronome.tick(),
        0.025,
        0.95,
    );

    let voices = sink.voices();
    assert_eq!(voices.iter().filter(|v| v.frequency == 440.0).count(), 1);
    assert_eq!(voices.iter().filter(|v| v.frequency != 440.0).count(), 3);

    melody.silence_now().unwrap();
    assert!(matches!(
        sink.commands().last(),
        Some(sightread::sink::RecordedCommand::SilenceAll { .. })
    ));
}
