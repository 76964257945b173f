mod app;
mod data;
mod util;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    #[arg(long, default_value = "data.ndjson")]
    data_url: String,

    #[arg(long, default_value = "grid.json")]
    grid_url: String,

    #[arg(long, default_value_t = 5000)]
    batch_size: usize,

    #[arg(long, default_value_t = app::DEFAULT_K_MIN)]
    min_zoom: f32,

    #[arg(long, default_value_t = app::DEFAULT_K_MAX)]
    max_zoom: f32,
}

fn main() -> eframe::Result<()> {
    env_logger::init();

    let args = Args::parse();
    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default().with_inner_size([1440.0, 920.0]),
        ..Default::default()
    };

    eframe::run_native(
        "embedmap",
        options,
        Box::new(move |cc| {
            Ok(Box::new(app::EmbedMapApp::new(
                cc,
                app::AppConfig {
                    data_url: args.data_url.clone(),
                    grid_url: args.grid_url.clone(),
                    batch_size: args.batch_size,
                    k_min: args.min_zoom,
                    k_max: args.max_zoom,
                },
            )))
        }),
    )
}
