use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::Read;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

use super::DataScales;

pub type DensityGrid = Vec<Vec<f32>>;

#[derive(Clone, Debug, Deserialize)]
pub struct GridData {
    #[serde(rename = "xRange")]
    pub x_range: [f32; 2],
    #[serde(rename = "yRange")]
    pub y_range: [f32; 2],
    #[serde(default)]
    pub grid: DensityGrid,
    #[serde(default, rename = "totalPointSize")]
    pub total_point_size: Option<u64>,
    #[serde(default, rename = "embeddingName")]
    pub embedding_name: Option<String>,
    #[serde(default, rename = "groupNames")]
    pub group_names: Option<Vec<String>>,
    #[serde(default, rename = "groupGrids")]
    pub group_grids: Option<HashMap<String, DensityGrid>>,
    #[serde(default, rename = "timeCounts")]
    pub time_counts: Option<HashMap<String, u64>>,
    #[serde(default, rename = "timeGrids")]
    pub time_grids: Option<HashMap<String, DensityGrid>>,
    #[serde(default)]
    pub topic: Option<TopicData>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TopicData {
    #[serde(default)]
    pub data: BTreeMap<String, Vec<TopicMarker>>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TopicMarker(pub f32, pub f32, pub String);

impl GridData {
    pub fn scales(&self) -> DataScales {
        DataScales::from_ranges(self.x_range, self.y_range)
    }

    pub fn times(&self) -> Vec<String> {
        let mut times = self
            .time_counts
            .as_ref()
            .map(|counts| counts.keys().cloned().collect::<Vec<_>>())
            .unwrap_or_default();
        times.sort();
        times
    }

    pub fn topic_levels(&self) -> Vec<u32> {
        let mut levels = self
            .topic
            .as_ref()
            .map(|topic| {
                topic
                    .data
                    .keys()
                    .filter_map(|level| level.parse::<u32>().ok())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        levels.sort_unstable();
        levels
    }

    pub fn topic_markers(&self, level: u32) -> &[TopicMarker] {
        self.topic
            .as_ref()
            .and_then(|topic| topic.data.get(&level.to_string()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

pub fn parse_grid_json(raw: &str) -> Result<GridData> {
    let grid: GridData = serde_json::from_str(raw).context("invalid grid JSON")?;

    if grid.x_range[1] <= grid.x_range[0] || grid.y_range[1] <= grid.y_range[0] {
        return Err(anyhow!(
            "degenerate grid ranges x={:?} y={:?}",
            grid.x_range,
            grid.y_range
        ));
    }

    Ok(grid)
}

pub fn fetch_grid_data(url: &str) -> Result<GridData> {
    let mut raw = String::new();

    if url.starts_with("http://") || url.starts_with("https://") {
        ureq::get(url)
            .call()
            .with_context(|| format!("grid request failed: {url}"))?
            .into_reader()
            .read_to_string(&mut raw)
            .context("grid response read failed")?;
    } else {
        File::open(url)
            .with_context(|| format!("cannot open grid file: {url}"))?
            .read_to_string(&mut raw)
            .context("grid file read failed")?;
    }

    parse_grid_json(&raw)
}
