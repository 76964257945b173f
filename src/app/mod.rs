use std::collections::{HashMap, VecDeque};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;

use eframe::egui::{self, Color32, Context, Pos2, Rect, Vec2};

use crate::data::{DataScales, GridData, Point, fetch_grid_data};

mod animate;
mod images;
mod indexer;
mod interaction;
mod layout;
mod loader;
mod render_utils;
mod spatial;
mod ui;
mod view;

use animate::DispersalAnimation;
use images::{ImageCommand, ImageRatioCache};
use indexer::{IndexEntry, IndexerCommand};
use layout::{LayoutOutcome, LayoutParams, LayoutPoint, LayoutRunner};
use loader::{Batch, LoaderCommand};
use render_utils::{ZoomTransform, citation_radius};
pub(crate) use render_utils::{DEFAULT_K_MAX, DEFAULT_K_MIN};
use spatial::SpatialIndex;

pub const SETTLE_DELAY_SECS: f64 = 0.3;
pub const HOVER_CLEAR_DELAY_SECS: f64 = 0.4;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub data_url: String,
    pub grid_url: String,
    pub batch_size: usize,
    pub k_min: f32,
    pub k_max: f32,
}

pub struct EmbedMapApp {
    config: AppConfig,
    state: AppState,
}

enum AppState {
    Loading {
        rx: Receiver<Result<GridData, String>>,
    },
    Ready(Box<ViewModel>),
    Error(String),
}

#[derive(Debug)]
pub(in crate::app) enum WorkerEvent {
    QuadtreeReady,
    FinishQuadtreeSearch { hit: Option<(u32, Vec2)> },
    TransferLoadData(Batch),
    LoadFailed { error: String },
    ImageProbed { url: String, ratio: Option<f32> },
}

#[derive(Clone, Copy, PartialEq)]
enum RedrawPhase {
    Idle,
    Zooming,
    Settling { deadline: f64 },
}

struct ViewScratch {
    screen_positions: Vec<Pos2>,
    screen_radii: Vec<f32>,
    visible_indices: Vec<usize>,
    visible_mask: Vec<bool>,
    index_cells: Vec<spatial::IndexCell>,
}

struct DensityCell {
    world_center: Vec2,
    world_half: Vec2,
    color: Color32,
}

struct SearchMatchCache {
    query: String,
    point_revision: u64,
    matches: std::sync::Arc<std::collections::HashSet<u32>>,
}

struct ViewModel {
    config: AppConfig,

    grid: Option<GridData>,
    scales: Option<DataScales>,
    density_cells: Vec<DensityCell>,
    times: Vec<String>,
    group_index_by_name: HashMap<String, usize>,

    points: Vec<Point>,
    max_citations: u32,
    point_revision: u64,

    spatial: SpatialIndex,
    streaming_done: bool,
    load_error: Option<String>,
    batches_received: usize,

    events_rx: Receiver<WorkerEvent>,
    loader_tx: Sender<LoaderCommand>,
    indexer_tx: Sender<IndexerCommand>,
    indexer_ready: bool,
    pending_indexer_search: bool,
    worker_channel_down: bool,

    layout_runner: LayoutRunner,
    layout_tx: Sender<LayoutOutcome>,
    layout_rx: Receiver<LayoutOutcome>,
    layout_running: bool,
    collide_strength: f32,
    origin_strength: f32,

    pre_positions: Vec<Vec2>,
    animation: Option<DispersalAnimation>,

    transform: ZoomTransform,
    redraw_phase: RedrawPhase,
    detail_dirty: bool,
    topic_level_current: Option<u32>,

    hovered: Option<usize>,
    hover_clear_deadline: Option<f64>,
    selected: Option<usize>,

    search: String,
    search_match_cache: Option<SearchMatchCache>,
    time_filter: Option<String>,
    group_filter: Option<String>,

    show_density: bool,
    show_topics: bool,
    show_index_overlay: bool,

    image_ratios: ImageRatioCache,
    image_tx: Sender<ImageCommand>,

    view_scratch: ViewScratch,
    last_rect: Rect,
    last_pointer: Option<Pos2>,
    visible_point_count: usize,

    show_fps_bar: bool,
    fps_current: f32,
    fps_samples: VecDeque<f32>,
}

impl EmbedMapApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, config: AppConfig) -> Self {
        let state = Self::start_load(config.grid_url.clone());
        Self { config, state }
    }

    fn spawn_grid_load(grid_url: String) -> Receiver<Result<GridData, String>> {
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let result = fetch_grid_data(&grid_url).map_err(|error| format!("{error:#}"));
            let _ = tx.send(result);
        });

        rx
    }

    fn start_load(grid_url: String) -> AppState {
        AppState::Loading {
            rx: Self::spawn_grid_load(grid_url),
        }
    }
}

impl eframe::App for EmbedMapApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        let mut transition = None;

        match &mut self.state {
            AppState::Loading { rx } => {
                match rx.try_recv() {
                    Ok(Ok(grid)) => {
                        transition = Some(AppState::Ready(Box::new(ViewModel::new(
                            self.config.clone(),
                            Some(grid),
                        ))));
                    }
                    Ok(Err(error)) => {
                        log::warn!("grid data unavailable, continuing without: {error}");
                        transition = Some(AppState::Ready(Box::new(ViewModel::new(
                            self.config.clone(),
                            None,
                        ))));
                    }
                    Err(TryRecvError::Empty) => {}
                    Err(TryRecvError::Disconnected) => {
                        transition = Some(AppState::Error(
                            "grid load worker disconnected".to_owned(),
                        ));
                    }
                }

                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(120.0);
                        ui.heading("Loading embedding map...");
                        ui.add_space(8.0);
                        ui.spinner();
                    });
                });
                ctx.request_repaint();
            }
            AppState::Error(error) => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.heading("Failed to start the embedding map");
                    ui.add_space(6.0);
                    ui.label(error.as_str());
                    ui.add_space(10.0);
                    if ui.button("Retry").clicked() {
                        transition = Some(Self::start_load(self.config.grid_url.clone()));
                    }
                });
            }
            AppState::Ready(model) => {
                let now = ctx.input(|input| input.time);
                let events_pending = model.pump_worker_events(now);
                if events_pending {
                    ctx.request_repaint();
                }

                if model.worker_channel_down {
                    transition = Some(AppState::Error(
                        "background worker channel disconnected".to_owned(),
                    ));
                } else {
                    model.show(ctx);
                }
            }
        }

        if let Some(next_state) = transition {
            self.state = next_state;
        }
    }
}

impl ViewModel {
    fn new(config: AppConfig, grid: Option<GridData>) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        let (layout_tx, layout_rx) = mpsc::channel();

        let loader_tx = loader::spawn_loader(config.batch_size, events_tx.clone());
        let image_tx = images::spawn_image_prober(events_tx.clone());
        let indexer_tx = indexer::spawn_indexer(events_tx);

        let scales = grid.as_ref().map(GridData::scales);
        let init = IndexerCommand::InitQuadtree {
            x_range: grid.as_ref().map_or([-1.0, 1.0], |grid| grid.x_range),
            y_range: grid.as_ref().map_or([-1.0, 1.0], |grid| grid.y_range),
        };
        if indexer_tx.send(init).is_err() {
            log::error!("spatial indexer worker unavailable at startup");
        }

        let times = grid.as_ref().map(GridData::times).unwrap_or_default();
        let group_index_by_name = grid
            .as_ref()
            .and_then(|grid| grid.group_names.as_ref())
            .map(|names| {
                names
                    .iter()
                    .enumerate()
                    .map(|(index, name)| (name.clone(), index))
                    .collect::<HashMap<_, _>>()
            })
            .unwrap_or_default();

        let mut model = Self {
            config,
            grid,
            scales,
            density_cells: Vec::new(),
            times,
            group_index_by_name,
            points: Vec::new(),
            max_citations: 0,
            point_revision: 0,
            spatial: SpatialIndex::new(),
            streaming_done: false,
            load_error: None,
            batches_received: 0,
            events_rx,
            loader_tx,
            indexer_tx,
            indexer_ready: false,
            pending_indexer_search: false,
            worker_channel_down: false,
            layout_runner: LayoutRunner::new(),
            layout_tx,
            layout_rx,
            layout_running: false,
            collide_strength: layout::DEFAULT_COLLIDE_STRENGTH,
            origin_strength: layout::DEFAULT_ORIGIN_STRENGTH,
            pre_positions: Vec::new(),
            animation: None,
            transform: ZoomTransform::identity(),
            redraw_phase: RedrawPhase::Idle,
            detail_dirty: true,
            topic_level_current: None,
            hovered: None,
            hover_clear_deadline: None,
            selected: None,
            search: String::new(),
            search_match_cache: None,
            time_filter: None,
            group_filter: None,
            show_density: true,
            show_topics: true,
            show_index_overlay: false,
            image_ratios: ImageRatioCache::new(),
            image_tx,
            view_scratch: ViewScratch {
                screen_positions: Vec::new(),
                screen_radii: Vec::new(),
                visible_indices: Vec::new(),
                visible_mask: Vec::new(),
                index_cells: Vec::new(),
            },
            last_rect: Rect::from_min_max(Pos2::ZERO, Pos2::new(1280.0, 860.0)),
            last_pointer: None,
            visible_point_count: 0,
            show_fps_bar: true,
            fps_current: 0.0,
            fps_samples: VecDeque::new(),
        };

        model.rebuild_density_cells();
        model
    }

    fn pump_worker_events(&mut self, now: f64) -> bool {
        let mut handled = false;

        loop {
            match self.events_rx.try_recv() {
                Ok(event) => {
                    handled = true;
                    self.handle_worker_event(event, now);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.worker_channel_down = true;
                    break;
                }
            }
        }

        while let Ok(outcome) = self.layout_rx.try_recv() {
            handled = true;
            self.handle_layout_outcome(outcome, now);
        }

        handled
    }

    fn handle_worker_event(&mut self, event: WorkerEvent, now: f64) {
        match event {
            WorkerEvent::QuadtreeReady => {
                self.indexer_ready = true;
                let command = LoaderCommand::StartLoadData {
                    url: self.config.data_url.clone(),
                };
                if self.loader_tx.send(command).is_err() {
                    self.load_error = Some("streaming loader worker unavailable".to_owned());
                }
            }
            WorkerEvent::TransferLoadData(batch) => self.apply_batch(batch, now),
            WorkerEvent::LoadFailed { error } => {
                self.streaming_done = true;
                self.load_error = Some(error);
            }
            WorkerEvent::FinishQuadtreeSearch { hit } => {
                self.pending_indexer_search = false;
                self.resolve_hover_candidate(hit, now);
            }
            WorkerEvent::ImageProbed { url, ratio } => {
                self.image_ratios.resolve(url, ratio);
            }
        }
    }

    fn apply_batch(&mut self, batch: Batch, now: f64) {
        self.batches_received += 1;
        if batch.is_last_batch {
            self.streaming_done = true;
        }
        if batch.points.is_empty() {
            return;
        }

        if let Some(animation) = self.animation.take() {
            let sampled = animation.sampled_positions(now);
            for (point, pos) in self.points.iter_mut().zip(sampled) {
                point.pos = pos;
            }
        }

        let indexed = batch
            .points
            .iter()
            .map(|point| IndexEntry {
                id: point.id,
                pos: point.raw,
                time: point.time.clone(),
                group: point.group.clone(),
            })
            .collect::<Vec<_>>();
        if self.indexer_ready
            && self
                .indexer_tx
                .send(IndexerCommand::UpdateQuadtree { points: indexed })
                .is_err()
        {
            log::warn!("spatial indexer worker gone; incremental index updates stopped");
        }

        for point in &batch.points {
            self.max_citations = self.max_citations.max(point.citations);
            if !point.group.is_empty() && !self.group_index_by_name.contains_key(&point.group) {
                let next = self.group_index_by_name.len();
                self.group_index_by_name.insert(point.group.clone(), next);
            }
        }
        self.points.extend(batch.points);
        self.point_revision = self.point_revision.wrapping_add(1);
        self.search_match_cache = None;

        if self.scales.is_none() {
            self.scales = DataScales::from_points(&self.points);
        }

        self.rebuild_spatial();
        self.start_layout();
        self.detail_dirty = true;
    }

    fn start_layout(&mut self) {
        let Some(scales) = self.scales else {
            return;
        };
        if self.points.is_empty() {
            return;
        }

        self.pre_positions = self.points.iter().map(|point| point.pos).collect();
        self.animation = None;

        let viewport = self.last_rect.size();
        let base_radius = render_utils::base_point_radius(self.points.len(), viewport);
        let max_citations = self.max_citations;
        let layout_points = self
            .points
            .iter()
            .map(|point| LayoutPoint {
                pos: point.pos,
                origin: point.raw,
                radius: citation_radius(base_radius, point.citations, max_citations)
                    / scales.world_per_data,
            })
            .collect::<Vec<_>>();

        self.layout_runner.update_simulation(
            layout_points,
            LayoutParams {
                collide_strength: self.collide_strength,
                origin_strength: self.origin_strength,
            },
            self.layout_tx.clone(),
        );
        self.layout_running = true;
    }

    fn handle_layout_outcome(&mut self, outcome: LayoutOutcome, now: f64) {
        if !self.layout_runner.is_current(outcome.generation) {
            log::debug!("discarding superseded layout generation {}", outcome.generation);
            return;
        }

        self.layout_running = false;
        if outcome.positions.len() != self.pre_positions.len()
            || outcome.positions.len() != self.points.len()
        {
            log::warn!("layout result size mismatch; skipping dispersal");
            return;
        }

        for (point, pre) in self.points.iter_mut().zip(&self.pre_positions) {
            point.pos = *pre;
        }
        self.animation = Some(DispersalAnimation::new(
            std::mem::take(&mut self.pre_positions),
            outcome.positions,
            now,
        ));
    }

    fn finalize_animation(&mut self) {
        let Some(animation) = self.animation.take() else {
            return;
        };

        for (point, post) in self.points.iter_mut().zip(animation.post()) {
            point.pos = *post;
        }
        self.detail_dirty = true;
        self.rebuild_spatial();
    }

    fn rebuild_spatial(&mut self) {
        let entries = self
            .points
            .iter()
            .filter(|point| self.point_passes_filters(point))
            .map(|point| (point.id, point.pos))
            .collect::<Vec<_>>();
        self.spatial = SpatialIndex::rebuild(entries.iter().copied());
    }

    fn point_passes_filters(&self, point: &Point) -> bool {
        if let Some(time) = &self.time_filter
            && &point.time != time
        {
            return false;
        }

        if let Some(group) = &self.group_filter
            && &point.group != group
        {
            return false;
        }

        true
    }

    fn group_index(&self, point: &Point) -> usize {
        self.group_index_by_name
            .get(&point.group)
            .copied()
            .unwrap_or(0)
    }

    fn set_selected(&mut self, selected: Option<usize>) {
        if self.selected == selected {
            return;
        }
        self.selected = selected;
        self.detail_dirty = true;
    }
}
