use std::time::Instant;

use voiceover_rs::engines::espeak::{EspeakBackend, EspeakParams};
use voiceover_rs::scene::{RenderHost, SimulatedRenderer, VoiceoverScene};
use voiceover_rs::service::{ServiceConfig, SpeechService};
use voiceover_rs::VoiceoverError;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let backend = EspeakBackend::with_params(EspeakParams {
        voice: "en-us".to_string(),
        rate: 160,
        ..Default::default()
    })?;
    let config = ServiceConfig::builder()
        .cache_dir("media/voiceovers")
        .global_speed(1.1)
        .build()?;
    let service = SpeechService::new(Box::new(backend), config)?;
    let mut scene = VoiceoverScene::new(SimulatedRenderer::new(30.0), service);

    let text = "This circle is drawn while I speak. <bookmark mark='square'/>Now a square appears.";

    let synth_start = Instant::now();
    scene.voiceover(text, |scene, tracker| {
        println!(
            "Narration of {:.2}s synthesized in {:.2?}",
            tracker.duration(),
            synth_start.elapsed()
        );
        match scene.wait_until_bookmark("square") {
            Ok(()) => println!("Reached 'square' at t={:.2}s", scene.renderer().time()),
            Err(VoiceoverError::BookmarksUnsupported) => {
                println!("espeak-ng has no word boundaries; waiting half the narration");
                let half = tracker.duration() / 2.0;
                scene.safe_wait(half);
            }
            Err(e) => return Err(e),
        }
        Ok(())
    })?;
    println!("Narration finished at t={:.2}s", scene.renderer().time());

    // Same text again: served from the cache.
    let cached_start = Instant::now();
    scene.voiceover(text, |_, _| Ok(()))?;
    println!("Cached narration loaded in {:.2?}", cached_start.elapsed());

    for (at, caption) in &scene.renderer().subcaptions {
        println!("[{at:6.2}s +{:.2}s] {}", caption.duration, caption.text);
    }
    Ok(())
}
