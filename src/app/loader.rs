use std::fs::File;
use std::io::{BufRead, BufReader};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use anyhow::{Context, Result};

use crate::data::{Point, parse_record};

use super::WorkerEvent;

pub(super) enum LoaderCommand {
    StartLoadData { url: String },
}

#[derive(Debug)]
pub(super) struct Batch {
    pub points: Vec<Point>,
    pub is_first_batch: bool,
    pub is_last_batch: bool,
}

pub(super) fn spawn_loader(batch_size: usize, events: Sender<WorkerEvent>) -> Sender<LoaderCommand> {
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || loader_main(rx, batch_size, events));

    tx
}

fn loader_main(commands: Receiver<LoaderCommand>, batch_size: usize, events: Sender<WorkerEvent>) {
    while let Ok(command) = commands.recv() {
        match command {
            LoaderCommand::StartLoadData { url } => {
                log::info!("streaming point data from {url}");
                let result = open_resource(&url).and_then(|reader| {
                    stream_records(reader, batch_size, &mut |batch| {
                        let _ = events.send(WorkerEvent::TransferLoadData(batch));
                    })
                });

                if let Err(error) = result {
                    log::error!("point stream failed: {error:#}");
                    let _ = events.send(WorkerEvent::LoadFailed {
                        error: format!("{error:#}"),
                    });
                }
            }
        }
    }
}

fn open_resource(url: &str) -> Result<Box<dyn BufRead + Send>> {
    if url.starts_with("http://") || url.starts_with("https://") {
        let response = ureq::get(url)
            .call()
            .with_context(|| format!("data request failed: {url}"))?;
        Ok(Box::new(BufReader::new(response.into_reader())))
    } else {
        let file = File::open(url).with_context(|| format!("cannot open data file: {url}"))?;
        Ok(Box::new(BufReader::new(file)))
    }
}

pub(super) fn stream_records(
    mut reader: impl BufRead,
    batch_size: usize,
    emit: &mut dyn FnMut(Batch),
) -> Result<()> {
    let batch_size = batch_size.max(1);
    let mut pending = Vec::with_capacity(batch_size);
    let mut raw_line = Vec::new();
    let mut next_id = 0u32;
    let mut skipped = 0usize;
    let mut emitted_any = false;

    loop {
        raw_line.clear();
        let bytes_read = reader
            .read_until(b'\n', &mut raw_line)
            .context("point stream read failed")?;
        if bytes_read == 0 {
            break;
        }

        let line = String::from_utf8_lossy(&raw_line);
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match parse_record(line, next_id) {
            Some(point) => {
                next_id += 1;
                if pending.len() >= batch_size {
                    emit(Batch {
                        points: std::mem::take(&mut pending),
                        is_first_batch: !emitted_any,
                        is_last_batch: false,
                    });
                    emitted_any = true;
                    pending.reserve(batch_size);
                }
                pending.push(point);
            }
            None => skipped += 1,
        }
    }

    emit(Batch {
        points: pending,
        is_first_batch: !emitted_any,
        is_last_batch: true,
    });

    if skipped > 0 {
        log::warn!("skipped {skipped} records without usable coordinates");
    }

    Ok(())
}
