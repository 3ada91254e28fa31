#[cfg(feature = "gui")]
use eframe::egui;

#[cfg(feature = "gui")]
use chiptrak::{
    model::{MAX_TEMPO, MIN_TEMPO},
    ChannelKind, EngineConfig, Event, Pitch, PlaybackEvent, Sequencer, Track, TrackerResult,
    Transport,
};

#[cfg(feature = "gui")]
use std::path::PathBuf;
#[cfg(feature = "gui")]
use std::sync::{Arc, PoisonError, RwLock};

#[cfg(feature = "gui")]
#[derive(clap::Parser, Debug)]
#[command(about = "Transport window for the chiptrak playback engine")]
struct Args {
    /// JSON engine config
    #[arg(long)]
    config: Option<PathBuf>,

    /// WAV clip for the noise channel
    #[arg(long)]
    noise: Option<PathBuf>,

    /// Run the transport without opening the audio device
    #[arg(long)]
    silent: bool,
}

#[cfg(feature = "gui")]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    use clap::Parser;

    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if args.noise.is_some() {
        config.noise_sample = args.noise;
    }

    let track = Arc::new(RwLock::new(demo_track()?));
    let sequencer = if args.silent {
        Sequencer::silent(Arc::clone(&track), &config)?
    } else {
        Sequencer::new(Arc::clone(&track), &config)?
    };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([520.0, 760.0])
            .with_title("CHIPTRAK"),
        ..Default::default()
    };

    eframe::run_native(
        "CHIPTRAK",
        options,
        Box::new(|_cc| Ok(Box::new(TransportApp::new(track, sequencer)))),
    )?;
    Ok(())
}

#[cfg(not(feature = "gui"))]
fn main() {
    eprintln!("This binary requires the 'gui' feature to be enabled");
    std::process::exit(1);
}

/// A short two-bar loop that exercises legato, staccato and rests on every
/// channel.
#[cfg(feature = "gui")]
fn demo_track() -> TrackerResult<Track> {
    let mut track = Track::new("demo");

    let mut lead = track.channel_mut(ChannelKind::Pulse1);
    for (row, pitch) in [(1, 25), (5, 29), (9, 32), (13, 37), (17, 36), (21, 32), (25, 29)] {
        lead.set_note(row, Pitch::new(pitch)?);
    }
    lead.set_rest(29);

    let mut harmony = track.channel_mut(ChannelKind::Pulse2);
    for row in (1..=32).step_by(2) {
        harmony.set_event(row, Event::staccato(Pitch::new(if row < 17 { 13 } else { 17 })?));
    }

    let mut bass = track.channel_mut(ChannelKind::Triangle);
    bass.set_note(1, Pitch::new(13)?);
    bass.set_rest(15);
    bass.set_note(17, Pitch::new(18)?);
    bass.set_rest(31);

    let mut drums = track.channel_mut(ChannelKind::Noise);
    for row in (1..=32).step_by(4) {
        drums.set_event(row, Event::staccato(Pitch::new(44)?));
        drums.set_event(row + 2, Event::staccato(Pitch::new(56)?));
    }

    Ok(track)
}

#[cfg(feature = "gui")]
struct TransportApp {
    track: Arc<RwLock<Track>>,
    sequencer: Sequencer,

    // UI state
    selected_row: usize,
    cursor_row: usize,
    status: Option<String>,
}

#[cfg(feature = "gui")]
impl TransportApp {
    fn new(track: Arc<RwLock<Track>>, sequencer: Sequencer) -> Self {
        Self {
            track,
            sequencer,
            selected_row: 0,
            cursor_row: 1,
            status: None,
        }
    }

    fn handle_playback_events(&mut self) {
        for event in self.sequencer.poll_events() {
            match event {
                PlaybackEvent::CursorMoved(row) => {
                    self.cursor_row = row;
                    self.selected_row = row - 1;
                }
                PlaybackEvent::Ended => {
                    self.status = Some("End of track".to_string());
                }
                PlaybackEvent::VoiceFailed { channel, message } => {
                    self.status = Some(format!("{} dropped a note: {}", channel, message));
                }
            }
        }
    }

    fn start_playback(&mut self) {
        self.status = None;
        if let Err(err) = self.sequencer.play(self.selected_row) {
            log::error!("could not start playback: {}", err);
            self.status = Some(err.to_string());
        }
    }
}

#[cfg(feature = "gui")]
impl eframe::App for TransportApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.request_repaint();

        self.handle_playback_events();
        let transport = self.sequencer.transport();

        egui::TopBottomPanel::top("transport").show(ctx, |ui| {
            ui.add_space(6.0);
            ui.horizontal(|ui| {
                if transport == Transport::Playing {
                    if ui.button("⏸ Pause").clicked() {
                        self.sequencer.pause();
                    }
                } else if ui.button("▶ Play").clicked() {
                    self.start_playback();
                }
                if ui.button("⏹ Stop").clicked() {
                    self.sequencer.stop();
                }

                ui.add_space(20.0);

                // Tempo is read when playback starts.
                ui.label("BPM:");
                let mut tempo = self
                    .track
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .tempo();
                let slider = egui::Slider::new(&mut tempo, MIN_TEMPO..=MAX_TEMPO).step_by(1.0);
                if ui.add_enabled(transport != Transport::Playing, slider).changed() {
                    self.track
                        .write()
                        .unwrap_or_else(PoisonError::into_inner)
                        .set_tempo(tempo);
                }
            });
            if let Some(status) = &self.status {
                ui.colored_label(egui::Color32::YELLOW, status);
            }
            ui.add_space(6.0);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            let track = self.track.read().unwrap_or_else(PoisonError::into_inner);
            ui.heading(track.name());
            ui.add_space(6.0);

            egui::ScrollArea::vertical().show(ui, |ui| {
                egui::Grid::new("rows").striped(true).show(ui, |ui| {
                    ui.monospace("row");
                    for kind in [
                        ChannelKind::Pulse1,
                        ChannelKind::Pulse2,
                        ChannelKind::Triangle,
                        ChannelKind::Noise,
                    ] {
                        ui.monospace(kind.name());
                    }
                    ui.end_row();

                    for row in 1..=track.channel_length() {
                        let is_current = transport != Transport::Stopped && row == self.cursor_row;
                        let is_selected = row == self.selected_row + 1;
                        let label = egui::SelectableLabel::new(
                            is_selected || is_current,
                            egui::RichText::new(format!("{:03}", row)).monospace(),
                        );
                        if ui.add(label).clicked() && transport == Transport::Stopped {
                            self.selected_row = row - 1;
                        }
                        for kind in [
                            ChannelKind::Pulse1,
                            ChannelKind::Pulse2,
                            ChannelKind::Triangle,
                            ChannelKind::Noise,
                        ] {
                            let cell = egui::RichText::new(track.event_at(kind, row).to_string())
                                .monospace();
                            if is_current {
                                ui.label(cell.color(egui::Color32::from_rgb(100, 200, 100)));
                            } else {
                                ui.label(cell);
                            }
                        }
                        ui.end_row();
                    }
                });
            });
        });
    }
}
