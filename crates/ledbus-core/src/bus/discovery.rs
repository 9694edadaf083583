//! Background watcher that turns registry changes into listener callbacks.
//!
//! Each tick diffs the registry against the previous snapshot:
//!
//! - `names/` → [`BusListener::name_owner_changed`]
//! - `adverts/` filtered by active discovery prefixes and their transport
//!   masks → [`BusListener::found_advertised_name`] /
//!   [`BusListener::lost_advertised_name`]
//!
//! The registry is read on the blocking pool. Found callbacks are awaited in order, one at a time, so a listener that
//! joins a session from the callback never races a second invocation.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace, warn};

use super::attachment::Shared;
use super::listener::TransportMask;
use super::registry::Advertisement;

/// `(prefix, name)` → transport of each advertisement already reported.
type FoundSet = BTreeMap<(String, String), TransportMask>;

pub(crate) async fn run(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(shared.discovery_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut owners: BTreeMap<String, String> = BTreeMap::new();
    let mut found = FoundSet::new();

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }
        let registry = shared.registry.clone();
        let snapshot =
            tokio::task::spawn_blocking(move || (registry.names(), registry.adverts())).await;
        let (names, adverts) = match snapshot {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "registry scan failed");
                continue;
            }
        };
        scan_names(&shared, &mut owners, names);
        scan_adverts(&shared, &mut found, adverts).await;
    }
    debug!(unique_name = %shared.unique_name, "discovery watcher stopped");
}

fn scan_names(
    shared: &Shared,
    owners: &mut BTreeMap<String, String>,
    current: BTreeMap<String, String>,
) {
    if current == *owners {
        return;
    }
    let changes = owner_changes(owners, &current);
    *owners = current;

    if changes.is_empty() {
        return;
    }
    let listeners = shared.listeners();
    for (name, previous, next) in &changes {
        trace!(name, ?previous, ?next, "name owner changed");
        for l in &listeners {
            l.name_owner_changed(name, previous.as_deref(), next.as_deref());
        }
    }
}

/// Owner transitions between two snapshots, in name order.
fn owner_changes(
    before: &BTreeMap<String, String>,
    after: &BTreeMap<String, String>,
) -> Vec<(String, Option<String>, Option<String>)> {
    let mut names: Vec<&String> = before.keys().chain(after.keys()).collect();
    names.sort();
    names.dedup();
    names
        .into_iter()
        .filter_map(|name| {
            let old = before.get(name);
            let new = after.get(name);
            (old != new).then(|| (name.clone(), old.cloned(), new.cloned()))
        })
        .collect()
}

/// Advertisements each active prefix matches, by name and transport.
fn matches(prefixes: &BTreeMap<String, TransportMask>, adverts: &[Advertisement]) -> FoundSet {
    let mut current = FoundSet::new();
    for advert in adverts {
        for (prefix, _) in prefixes.iter().filter(|(prefix, mask)| {
            advert.name.starts_with(prefix.as_str()) && advert.transport.intersects(**mask)
        }) {
            current.insert((prefix.clone(), advert.name.clone()), advert.transport);
        }
    }
    current
}

async fn scan_adverts(shared: &Shared, found: &mut FoundSet, adverts: Vec<Advertisement>) {
    let prefixes = shared.discovery_prefixes();
    if prefixes.is_empty() && found.is_empty() {
        return;
    }

    let current = matches(&prefixes, &adverts);

    let lost: Vec<_> = found
        .iter()
        .filter(|(key, _)| !current.contains_key(*key))
        .map(|(key, t)| (key.clone(), *t))
        .collect();
    let new: Vec<_> = current
        .iter()
        .filter(|(key, _)| !found.contains_key(*key))
        .map(|(key, t)| (key.clone(), *t))
        .collect();
    *found = current;

    if lost.is_empty() && new.is_empty() {
        return;
    }
    let listeners = shared.listeners();
    for ((prefix, name), transport) in &lost {
        // a cancelled prefix drops its entries without a callback
        if !prefixes.contains_key(prefix) {
            continue;
        }
        debug!(name, prefix, "advertised name lost");
        for l in &listeners {
            l.lost_advertised_name(name, *transport, prefix);
        }
    }
    for ((prefix, name), transport) in &new {
        debug!(name, prefix, "advertised name found");
        for l in &listeners {
            l.found_advertised_name(name, *transport, prefix).await;
        }
    }
}
