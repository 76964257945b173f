use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use eframe::egui::{Vec2, vec2};

use super::WorkerEvent;
use super::spatial::SpatialIndex;

pub(super) struct IndexEntry {
    pub id: u32,
    pub pos: Vec2,
    pub time: String,
    pub group: String,
}

pub(super) enum IndexerCommand {
    InitQuadtree {
        x_range: [f32; 2],
        y_range: [f32; 2],
    },
    UpdateQuadtree {
        points: Vec<IndexEntry>,
    },
    StartQuadtreeSearch {
        x: f32,
        y: f32,
        time: Option<String>,
        group: Option<String>,
    },
}

pub(super) fn spawn_indexer(events: Sender<WorkerEvent>) -> Sender<IndexerCommand> {
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || indexer_main(rx, events));

    tx
}

fn indexer_main(commands: Receiver<IndexerCommand>, events: Sender<WorkerEvent>) {
    let mut index: Option<SpatialIndex> = None;
    let mut meta: HashMap<u32, (String, String)> = HashMap::new();

    while let Ok(command) = commands.recv() {
        match command {
            IndexerCommand::InitQuadtree { x_range, y_range } => {
                index = Some(SpatialIndex::with_bounds(x_range, y_range));
                meta.clear();
                if events.send(WorkerEvent::QuadtreeReady).is_err() {
                    break;
                }
            }
            IndexerCommand::UpdateQuadtree { points } => match index.as_mut() {
                Some(index) => {
                    for entry in points {
                        index.insert(entry.id, entry.pos);
                        meta.insert(entry.id, (entry.time, entry.group));
                    }
                }
                None => {
                    log::warn!("updateQuadtree before initQuadtree; ignoring batch");
                }
            },
            IndexerCommand::StartQuadtreeSearch { x, y, time, group } => {
                let hit = index
                    .as_ref()
                    .and_then(|index| {
                        index.nearest_where(vec2(x, y), |id| {
                            meta.get(&id).is_none_or(|(entry_time, entry_group)| {
                                time.as_ref().is_none_or(|wanted| wanted == entry_time)
                                    && group.as_ref().is_none_or(|wanted| wanted == entry_group)
                            })
                        })
                    })
                    .map(|hit| (hit.id, hit.pos));
                if events
                    .send(WorkerEvent::FinishQuadtreeSearch { hit })
                    .is_err()
                {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn entry(id: u32, x: f32, y: f32, time: &str, group: &str) -> IndexEntry {
        IndexEntry {
            id,
            pos: vec2(x, y),
            time: time.to_owned(),
            group: group.to_owned(),
        }
    }

    fn recv(events: &Receiver<WorkerEvent>) -> WorkerEvent {
        events
            .recv_timeout(Duration::from_secs(10))
            .expect("indexer should answer")
    }

    #[test]
    fn init_update_search_round_trip() {
        let (events_tx, events_rx) = mpsc::channel();
        let commands = spawn_indexer(events_tx);

        commands
            .send(IndexerCommand::InitQuadtree {
                x_range: [0.0, 20.0],
                y_range: [0.0, 20.0],
            })
            .unwrap();
        assert!(matches!(recv(&events_rx), WorkerEvent::QuadtreeReady));

        commands
            .send(IndexerCommand::UpdateQuadtree {
                points: vec![
                    entry(0, 0.0, 0.0, "2018", "ml"),
                    entry(1, 10.0, 10.0, "2019", "vision"),
                    entry(2, 5.0, 5.0, "2020", "ml"),
                ],
            })
            .unwrap();
        commands
            .send(IndexerCommand::StartQuadtreeSearch {
                x: 4.0,
                y: 4.0,
                time: None,
                group: None,
            })
            .unwrap();

        match recv(&events_rx) {
            WorkerEvent::FinishQuadtreeSearch { hit: Some((id, pos)) } => {
                assert_eq!(id, 2);
                assert_eq!(pos, vec2(5.0, 5.0));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn filtered_search_resolves_nearest_matching_point() {
        let (events_tx, events_rx) = mpsc::channel();
        let commands = spawn_indexer(events_tx);

        commands
            .send(IndexerCommand::InitQuadtree {
                x_range: [0.0, 20.0],
                y_range: [0.0, 20.0],
            })
            .unwrap();
        assert!(matches!(recv(&events_rx), WorkerEvent::QuadtreeReady));

        commands
            .send(IndexerCommand::UpdateQuadtree {
                points: vec![
                    entry(0, 4.0, 4.0, "2020", "ml"),
                    entry(1, 10.0, 10.0, "2019", "vision"),
                    entry(2, 16.0, 16.0, "2019", "ml"),
                ],
            })
            .unwrap();

        commands
            .send(IndexerCommand::StartQuadtreeSearch {
                x: 4.0,
                y: 4.0,
                time: Some("2019".to_owned()),
                group: None,
            })
            .unwrap();
        match recv(&events_rx) {
            WorkerEvent::FinishQuadtreeSearch { hit: Some((id, _)) } => assert_eq!(id, 1),
            other => panic!("unexpected event: {other:?}"),
        }

        commands
            .send(IndexerCommand::StartQuadtreeSearch {
                x: 4.0,
                y: 4.0,
                time: Some("2019".to_owned()),
                group: Some("ml".to_owned()),
            })
            .unwrap();
        match recv(&events_rx) {
            WorkerEvent::FinishQuadtreeSearch { hit: Some((id, _)) } => assert_eq!(id, 2),
            other => panic!("unexpected event: {other:?}"),
        }

        commands
            .send(IndexerCommand::StartQuadtreeSearch {
                x: 4.0,
                y: 4.0,
                time: Some("1990".to_owned()),
                group: None,
            })
            .unwrap();
        assert!(matches!(
            recv(&events_rx),
            WorkerEvent::FinishQuadtreeSearch { hit: None }
        ));
    }

    #[test]
    fn search_before_init_answers_none() {
        let (events_tx, events_rx) = mpsc::channel();
        let commands = spawn_indexer(events_tx);

        commands
            .send(IndexerCommand::StartQuadtreeSearch {
                x: 1.0,
                y: 1.0,
                time: None,
                group: None,
            })
            .unwrap();
        assert!(matches!(
            recv(&events_rx),
            WorkerEvent::FinishQuadtreeSearch { hit: None }
        ));
    }

    #[test]
    fn update_before_init_is_ignored() {
        let (events_tx, events_rx) = mpsc::channel();
        let commands = spawn_indexer(events_tx);

        commands
            .send(IndexerCommand::UpdateQuadtree {
                points: vec![entry(0, 1.0, 1.0, "2020", "ml")],
            })
            .unwrap();
        commands
            .send(IndexerCommand::InitQuadtree {
                x_range: [0.0, 2.0],
                y_range: [0.0, 2.0],
            })
            .unwrap();
        assert!(matches!(recv(&events_rx), WorkerEvent::QuadtreeReady));

        commands
            .send(IndexerCommand::StartQuadtreeSearch {
                x: 1.0,
                y: 1.0,
                time: None,
                group: None,
            })
            .unwrap();
        assert!(matches!(
            recv(&events_rx),
            WorkerEvent::FinishQuadtreeSearch { hit: None }
        ));
    }
}
