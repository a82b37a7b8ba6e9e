// Copyright (C) 2026  Leadtime Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.
//! Image label source
//!
//! Builders such as source-to-image stamp the commit id, source location
//! and commit date onto the image they produce. The same key names used
//! for workload annotations are looked up among those labels.

use async_trait::async_trait;
use leadtime_core::{
    AdapterError, AnnotationKeys, FactSource, MetricKind, RawFact, SourceAdapter, Workload,
};

/// Reads facts from the labels of a workload's image
#[derive(Debug, Clone)]
pub struct ImageLabelAdapter {
    keys: AnnotationKeys,
    kind: MetricKind,
}

impl ImageLabelAdapter {
    /// Adapter producing facts for `kind` using the configured key names
    pub fn new(keys: AnnotationKeys, kind: MetricKind) -> Self {
        Self { keys, kind }
    }
}

#[async_trait]
impl SourceAdapter for ImageLabelAdapter {
    fn name(&self) -> &str {
        "image"
    }

    async fn fetch(&self, workload: &Workload) -> Result<RawFact, AdapterError> {
        self.keys
            .extract(FactSource::Image, &workload.image_labels, self.kind)
            .ok_or_else(|| {
                AdapterError::not_found(format!(
                    "image of {} has no '{}' label",
                    workload.display_name(),
                    self.keys.time_key(self.kind)
                ))
            })
    }
}
