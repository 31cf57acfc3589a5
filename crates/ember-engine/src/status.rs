// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Exit status codes reported by the engine and its subsystem threads.

use std::fmt;

/// Well-known exit statuses. Applications may report any other `i32` through
/// [`EngineContext::request_exit`](crate::EngineContext::request_exit).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ExitStatus {
    /// Clean stop.
    Success = 0,
    /// A subsystem's `init` refused to start; used as the thread's status.
    InitFailed = 1,
    /// A subsystem failed to launch from `exec`.
    LaunchFailed = 2,
    /// The engine was destroyed while still running.
    ForcedStop = 3,
}

impl ExitStatus {
    /// The numeric code.
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Maps a numeric code back to a well-known status.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Success),
            1 => Some(Self::InitFailed),
            2 => Some(Self::LaunchFailed),
            3 => Some(Self::ForcedStop),
            _ => None,
        }
    }
}

impl From<ExitStatus> for i32 {
    fn from(status: ExitStatus) -> Self {
        status.code()
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Success => "success",
            Self::InitFailed => "init failed",
            Self::LaunchFailed => "launch failed",
            Self::ForcedStop => "forced stop",
        };
        write!(f, "{label} ({})", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for status in [
            ExitStatus::Success,
            ExitStatus::InitFailed,
            ExitStatus::LaunchFailed,
            ExitStatus::ForcedStop,
        ] {
            assert_eq!(ExitStatus::from_code(status.code()), Some(status));
        }
        assert_eq!(ExitStatus::from_code(42), None);
        assert_eq!(i32::from(ExitStatus::ForcedStop), 3);
        assert_eq!(ExitStatus::LaunchFailed.to_string(), "launch failed (2)");
    }
}
