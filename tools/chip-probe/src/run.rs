//! Run command - mount a module and report what it does

use anyhow::{Context, Result, bail};
use chipbridge_codec::{ChipFamily, ConfigPatch};
use chipbridge_core::{Bridge, InstanceListener, InstanceStatus, SamplePlayback};
use clap::Args;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::{config_to_json, parse_family, read_config};

/// Arguments for the run command
#[derive(Args)]
pub struct RunArgs {
    /// Chip family (psg, fm, pcm, wave, macro, instrument, hively)
    #[arg(value_parser = parse_family)]
    pub family: ChipFamily,

    /// Config JSON file with the family's fields
    pub config: PathBuf,

    /// Frames to drive before disposing
    #[arg(short, long, default_value_t = 0)]
    pub ticks: u32,

    /// Directory or URL prefix modules are resolved against
    #[arg(long)]
    pub modules: Option<String>,

    /// Give up if loading takes longer than this many seconds
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,
}

/// Prints every callback as one JSON line on stdout
struct PrintingListener;

impl InstanceListener for PrintingListener {
    fn config_changed(&self, patch: &ConfigPatch) {
        println!("{}", json!({ "event": "patch", "patch": format!("{:?}", patch) }));
    }

    fn play_sample(&self, playback: SamplePlayback) {
        println!(
            "{}",
            json!({
                "event": "play_sample",
                "samples": playback.samples,
                "bytes": playback.data.len(),
                "loop_start": playback.loop_start,
                "loop_len": playback.loop_len,
                "loop": format!("{:?}", playback.loop_kind),
                "is_16bit": playback.is_16bit,
            })
        );
    }

    fn stop_sample(&self) {
        println!("{}", json!({ "event": "stop_sample" }));
    }
}

/// Execute the run command
pub fn execute(args: RunArgs) -> Result<()> {
    let config = read_config(args.family, &args.config)?;

    let mut bridge_config = chipbridge_core::config::load();
    if let Some(root) = args.modules.clone() {
        bridge_config.modules.root = root;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(async move {
        let bridge = Bridge::new(bridge_config)?;
        let descriptor = bridge.config().descriptor_for(args.family);
        tracing::info!(family = %args.family, url = %descriptor.url, "mounting module");

        let controller = bridge.mount(args.family, config, Arc::new(PrintingListener));
        let status = tokio::time::timeout(
            Duration::from_secs(args.timeout),
            controller.wait_until_settled(),
        )
        .await
        .with_context(|| format!("{} module did not load within {}s", args.family, args.timeout))?;

        if let InstanceStatus::Failed(_) = status {
            let label = controller
                .fallback_label()
                .unwrap_or_else(|| format!("{} unavailable", args.family.display_name()));
            controller.dispose().await;
            bail!(label);
        }
        println!("{}", json!({ "event": "ready", "surface": controller.surface().0 }));

        for frame in 0..args.ticks {
            if !controller.tick()? {
                tracing::debug!(frame, "module has no tick entry point");
                break;
            }
        }

        controller.dispose().await;
        let final_config = config_to_json(&controller.config())?;
        println!("{}", json!({ "event": "disposed", "config": final_config }));
        Ok(())
    })
}
