// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::HashSet;

use chrono::DateTime;
use tether_common_protocol::BranchRecord;

use crate::git::RefEntry;

const LOCAL_PREFIX: &str = "refs/heads/";
const REMOTE_PREFIX: &str = "refs/remotes/";

/// Turns raw refs into branch records.
///
/// Local branches keep their order. A remote-tracking ref becomes a
/// remote-only record unless a local branch of the same name exists, and the
/// symbolic `<remote>/HEAD` ref is skipped.
pub fn branch_records(refs: &[RefEntry]) -> Vec<BranchRecord> {
	let locals: HashSet<&str> = refs
		.iter()
		.filter_map(|r| r.refname.strip_prefix(LOCAL_PREFIX))
		.collect();

	let mut seen = HashSet::new();
	let mut records = Vec::new();
	for entry in refs {
		let (name, remote_only) = if let Some(name) = entry.refname.strip_prefix(LOCAL_PREFIX) {
			(name, false)
		} else if let Some(rest) = entry.refname.strip_prefix(REMOTE_PREFIX) {
			let Some((_, name)) = rest.split_once('/') else {
				continue;
			};
			if name == "HEAD" || locals.contains(name) {
				continue;
			}
			(name, true)
		} else {
			continue;
		};

		if !seen.insert(name) {
			continue;
		}
		let mut record = BranchRecord::new(name);
		record.current = entry.is_head && !remote_only;
		record.remote_only = remote_only;
		record.last_activity = entry
			.committed_at
			.and_then(|secs| DateTime::from_timestamp(secs, 0));
		records.push(record);
	}
	records
}
