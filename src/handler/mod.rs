// Copyright 2026 KillKrill Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! The two ingress surfaces: HTTP (control-plane and batch submission) and
//! UDP (per-source syslog listeners).

pub mod http;
pub mod udp;
