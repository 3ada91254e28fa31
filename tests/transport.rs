use chiptrak::{
    ChannelKind, EngineConfig, Event, Oscillator, Pitch, PlaybackEvent, Sequencer, TrackerResult,
    Track, Transport,
};
use crossbeam_channel::Receiver;
use std::sync::{Arc, Mutex, RwLock};
use std::thread;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Play(u8),
    Stop,
}

type CallLog = Arc<Mutex<Vec<(ChannelKind, Call)>>>;

struct RecordingOscillator {
    kind: ChannelKind,
    calls: CallLog,
}

impl Oscillator for RecordingOscillator {
    fn play(&mut self, pitch: Pitch) -> TrackerResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push((self.kind, Call::Play(pitch.value())));
        Ok(())
    }

    fn stop(&mut self) {
        self.calls.lock().unwrap().push((self.kind, Call::Stop));
    }
}

/// One bar at the fastest tempo, so a full pass takes about a second.
fn fast_track() -> Track {
    let mut track = Track::new("transport");
    track.remove_bars(1).unwrap();
    track.set_tempo(chiptrak::model::MAX_TEMPO);
    track
}

fn sequencer_for(track: Track) -> (Sequencer, CallLog) {
    let calls: CallLog = Arc::new(Mutex::new(Vec::new()));
    let calls_in = Arc::clone(&calls);
    let sequencer = Sequencer::with_oscillators(Arc::new(RwLock::new(track)), move |kind| {
        Box::new(RecordingOscillator {
            kind,
            calls: Arc::clone(&calls_in),
        })
    });
    (sequencer, calls)
}

fn next_event(events: &Receiver<PlaybackEvent>) -> PlaybackEvent {
    events
        .recv_timeout(TIMEOUT)
        .expect("sequencer went quiet")
}

#[test]
fn end_of_track_stops_exactly_once() {
    let (mut sequencer, _calls) = sequencer_for(fast_track());
    let events = sequencer.events();

    sequencer.play(0).unwrap();
    let mut rows = Vec::new();
    loop {
        match next_event(&events) {
            PlaybackEvent::CursorMoved(row) => rows.push(row),
            PlaybackEvent::Ended => break,
            other => panic!("unexpected {:?}", other),
        }
    }

    let mut expected: Vec<usize> = (1..=16).collect();
    expected.push(1);
    assert_eq!(rows, expected);
    assert_eq!(sequencer.transport(), Transport::Stopped);
    assert_eq!(sequencer.current_row(), 1);

    thread::sleep(Duration::from_millis(200));
    assert!(sequencer.poll_events().is_empty());
}

#[test]
fn play_starts_after_the_selected_row() {
    let (mut sequencer, _calls) = sequencer_for(fast_track());
    let events = sequencer.events();

    sequencer.play(4).unwrap();
    assert_eq!(next_event(&events), PlaybackEvent::CursorMoved(5));
    sequencer.stop();
}

#[test]
fn pause_keeps_the_row_and_resume_continues() {
    let (mut sequencer, calls) = sequencer_for(fast_track());
    let events = sequencer.events();

    sequencer.play(0).unwrap();
    assert_eq!(next_event(&events), PlaybackEvent::CursorMoved(1));
    assert_eq!(next_event(&events), PlaybackEvent::CursorMoved(2));
    sequencer.pause();
    assert_eq!(sequencer.transport(), Transport::Paused);

    let paused_row = sequencer.current_row();
    let mut last_row = 2;
    for event in sequencer.poll_events() {
        if let PlaybackEvent::CursorMoved(row) = event {
            last_row = row;
        }
    }
    assert_eq!(paused_row, last_row + 1);

    // Every channel was silenced by the pause.
    {
        let calls = calls.lock().unwrap();
        let tail = &calls[calls.len() - 4..];
        assert!(tail.iter().all(|(_, call)| *call == Call::Stop));
    }

    thread::sleep(Duration::from_millis(150));
    assert_eq!(sequencer.current_row(), paused_row);
    assert!(sequencer.poll_events().is_empty());

    // The selection is ignored when resuming.
    sequencer.play(10).unwrap();
    assert_eq!(next_event(&events), PlaybackEvent::CursorMoved(paused_row));
    sequencer.stop();
}

#[test]
fn stop_rewinds_and_silences() {
    let (mut sequencer, calls) = sequencer_for(fast_track());
    let events = sequencer.events();

    sequencer.play(2).unwrap();
    assert_eq!(next_event(&events), PlaybackEvent::CursorMoved(3));
    sequencer.stop();

    assert_eq!(sequencer.transport(), Transport::Stopped);
    assert_eq!(sequencer.current_row(), 1);
    assert_eq!(
        sequencer.poll_events().last(),
        Some(&PlaybackEvent::CursorMoved(1))
    );
    let call_count = calls.lock().unwrap().len();
    {
        let calls = calls.lock().unwrap();
        let tail = &calls[calls.len() - 4..];
        assert!(tail.iter().all(|(_, call)| *call == Call::Stop));
    }

    thread::sleep(Duration::from_millis(150));
    assert!(sequencer.poll_events().is_empty());
    assert_eq!(calls.lock().unwrap().len(), call_count);

    // Starting again from Stopped honours the new selection.
    sequencer.play(0).unwrap();
    assert_eq!(next_event(&events), PlaybackEvent::CursorMoved(1));
    sequencer.stop();
}

#[test]
fn staccato_and_legato_over_a_full_pass() {
    let mut track = fast_track();
    let pitch = |value| Pitch::new(value).unwrap();
    {
        let mut pulse = track.channel_mut(ChannelKind::Pulse1);
        pulse.set_event(1, Event::staccato(pitch(1)));
        pulse.set_rest(3);
    }
    {
        let mut triangle = track.channel_mut(ChannelKind::Triangle);
        triangle.set_note(1, pitch(5));
        triangle.set_rest(4);
    }

    let (mut sequencer, calls) = sequencer_for(track);
    let events = sequencer.events();
    sequencer.play(0).unwrap();
    while next_event(&events) != PlaybackEvent::Ended {}

    let calls = calls.lock().unwrap();
    let for_channel = |kind: ChannelKind| -> Vec<Call> {
        calls
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, call)| call.clone())
            .collect()
    };
    // Cut on row 2, the rest's own stop on row 3, then the end-of-track stop.
    assert_eq!(
        for_channel(ChannelKind::Pulse1),
        vec![Call::Play(1), Call::Stop, Call::Stop, Call::Stop]
    );
    // Sustained through rows 2-3, stopped by the rest, then end-of-track.
    assert_eq!(
        for_channel(ChannelKind::Triangle),
        vec![Call::Play(5), Call::Stop, Call::Stop]
    );
    // Untouched channels only see the end-of-track stop.
    assert_eq!(for_channel(ChannelKind::Noise), vec![Call::Stop]);
}

#[test]
fn silent_sequencer_plays_through_to_the_end() {
    let mut track = fast_track();
    for kind in ChannelKind::ALL {
        track.channel_mut(kind).set_note(1, Pitch::new(1).unwrap());
    }
    let mut sequencer =
        Sequencer::silent(Arc::new(RwLock::new(track)), &EngineConfig::default()).unwrap();
    let events = sequencer.events();

    sequencer.play(0).unwrap();
    let mut failures = 0;
    loop {
        match next_event(&events) {
            PlaybackEvent::Ended => break,
            PlaybackEvent::VoiceFailed { .. } => failures += 1,
            PlaybackEvent::CursorMoved(_) => {}
        }
    }
    assert_eq!(failures, 0);
    assert_eq!(sequencer.transport(), Transport::Stopped);
}

struct PanickingOscillator;

impl Oscillator for PanickingOscillator {
    fn play(&mut self, _pitch: Pitch) -> TrackerResult<()> {
        panic!("voice blew up");
    }

    fn stop(&mut self) {}
}

#[test]
fn panicking_voice_ends_playback() {
    let mut track = fast_track();
    track
        .channel_mut(ChannelKind::Triangle)
        .set_note(3, Pitch::new(12).unwrap());
    let mut sequencer = Sequencer::with_oscillators(Arc::new(RwLock::new(track)), |_| {
        Box::new(PanickingOscillator)
    });
    let events = sequencer.events();

    sequencer.play(0).unwrap();
    let mut rows = Vec::new();
    loop {
        match next_event(&events) {
            PlaybackEvent::CursorMoved(row) => rows.push(row),
            PlaybackEvent::Ended => break,
            other => panic!("unexpected {:?}", other),
        }
    }
    assert_eq!(rows, vec![1, 2, 1]);
    assert_eq!(sequencer.transport(), Transport::Stopped);
    assert_eq!(sequencer.current_row(), 1);

    // A fresh start works after the failure.
    sequencer.play(0).unwrap();
    assert_eq!(next_event(&events), PlaybackEvent::CursorMoved(1));
    sequencer.stop();
}
