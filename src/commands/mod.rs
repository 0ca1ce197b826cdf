// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod config;
pub mod doctor;
pub mod importer;
pub mod prices;
pub mod returns;
pub mod transactions;
