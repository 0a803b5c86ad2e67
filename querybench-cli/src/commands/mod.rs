// SPDX-License-Identifier: Apache-2.0

pub mod run;
pub mod seed;
pub mod validate;
