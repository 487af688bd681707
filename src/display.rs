//! The "Output" window.
//!
//! Each repaint pulls one frame through the [`Player`] and shows it. Escape
//! closes the window.

use std::time::Duration;

use anyhow::Result;
use eframe::egui;
use image::RgbImage;

use crate::player::{Player, Step};

pub const WINDOW_TITLE: &str = "Output";

/// Blocks until the window is closed.
///
/// With `hold_last_frame` the window stays open on the final frame once the
/// source is exhausted; otherwise it closes itself.
pub fn show(player: Player, poll: Duration, hold_last_frame: bool) -> Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_title(WINDOW_TITLE),
        ..Default::default()
    };

    eframe::run_native(
        WINDOW_TITLE,
        options,
        Box::new(move |_cc| Ok(Box::new(Viewer::new(player, poll, hold_last_frame)))),
    )
    .map_err(|e| anyhow::anyhow!("display window failed: {}", e))
}

struct Viewer {
    player: Player,
    poll: Duration,
    hold_last_frame: bool,
    texture: Option<egui::TextureHandle>,
    finished: bool,
}

impl Viewer {
    fn new(player: Player, poll: Duration, hold_last_frame: bool) -> Self {
        Self {
            player,
            poll,
            hold_last_frame,
            texture: None,
            finished: false,
        }
    }

    fn upload(&mut self, ctx: &egui::Context, frame: &RgbImage) {
        let size = [frame.width() as usize, frame.height() as usize];
        let image = egui::ColorImage::from_rgb(size, frame.as_raw());
        if let Some(texture) = self.texture.as_mut() {
            texture.set(image, egui::TextureOptions::LINEAR);
            return;
        }
        self.texture = Some(ctx.load_texture("frame", image, egui::TextureOptions::LINEAR));
    }
}

impl eframe::App for Viewer {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            return;
        }

        if !self.finished {
            match self.player.step() {
                Step::Frame(frame, _report) => self.upload(ctx, &frame),
                Step::Skipped => {}
                Step::Finished => {
                    self.finished = true;
                    if !self.hold_last_frame {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                }
            }
        }

        egui::CentralPanel::default().show(ctx, |ui| match &self.texture {
            Some(texture) => {
                ui.image((texture.id(), texture.size_vec2()));
            }
            None => {
                ui.label("Waiting for frames...");
            }
        });

        if !self.finished {
            ctx.request_repaint_after(self.poll);
        }
    }
}
