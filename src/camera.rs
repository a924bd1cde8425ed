// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Camera activity sensing.
//!
//! On some SoCs the camera pipeline shares the display's power and bus resources, so the display
//! must stay awake while the camera is streaming.

use base::error;
use base::MmioError;
use base::MmioRegion;
use base::MmioResult;

/// Bits of the camera operation register that are set while any camera block is running.
pub const CAMERA_OPERATION_MASK: u32 = 0xf;

/// Reports whether a camera is currently operating.
pub trait CameraActivity: Send + Sync {
    fn is_operating(&self) -> bool;
}

/// Camera activity read from the SoC camera operation register.
///
/// The register stays mapped for the lifetime of the value.
#[derive(Debug)]
pub struct CameraOperationRegister {
    region: MmioRegion,
}

impl CameraOperationRegister {
    /// Maps the register at physical address `addr`, which must be 4-byte aligned.
    pub fn map(addr: u64) -> MmioResult<CameraOperationRegister> {
        let len = std::mem::size_of::<u32>();
        if addr % len as u64 != 0 {
            return Err(MmioError::InvalidAddress { addr, len });
        }
        Ok(CameraOperationRegister::from_region(MmioRegion::map(addr, len)?))
    }

    pub fn from_region(region: MmioRegion) -> CameraOperationRegister {
        CameraOperationRegister { region }
    }
}

impl CameraActivity for CameraOperationRegister {
    fn is_operating(&self) -> bool {
        match self.region.read_u32(0) {
            Ok(value) => value & CAMERA_OPERATION_MASK != 0,
            Err(e) => {
                // Keep the display awake when the camera state is unknown.
                error!("failed to read camera operation register: {}", e);
                true
            }
        }
    }
}
