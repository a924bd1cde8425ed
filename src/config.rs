// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Static hibernation configuration of one display pipeline.
///
/// ```json
/// {
///     "hibernation": true,
///     "camera-operation": { "reg": 439353344 }
/// }
/// ```
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct HibernationConfig {
    /// Whether this hardware supports display hibernation at all.
    #[serde(default)]
    pub hibernation: bool,
    /// Camera operation register; absent on SoCs that do not need the check.
    #[serde(default)]
    pub camera_operation: Option<CameraOperationConfig>,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct CameraOperationConfig {
    /// Physical address of the register.
    pub reg: u64,
}

impl HibernationConfig {
    pub fn from_json_str(json: &str) -> Result<HibernationConfig> {
        serde_json::from_str(json).map_err(Error::ParseConfig)
    }

    pub fn from_file(path: &Path) -> Result<HibernationConfig> {
        let json = fs::read_to_string(path).map_err(|source| Error::ReadConfig {
            path: path.to_owned(),
            source,
        })?;
        HibernationConfig::from_json_str(&json)
    }
}
