/********************************************************************************
 * Copyright (c) 2024 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr};
use vtap_controller::routing::membership::resolve_in;
use vtap_controller::routing::membership_diff::{apply_host_transition, DeviceDelta};
use vtap_controller::{DeviceId, Facet, HostLocation, HostRecord, IpProtocol, VtapCriterion};

/// Hosts spread over 256 /24 networks and 64 devices.
fn hosts(count: u32) -> Vec<HostRecord> {
    (0..count)
        .map(|index| {
            let address = IpAddr::V4(Ipv4Addr::new(10, 0, (index % 256) as u8, (index / 256 % 250 + 1) as u8));
            HostRecord::new(format!("vm-{index}"))
                .with_ip(address)
                .with_location(HostLocation::new(
                    DeviceId::new(format!("of:{:016x}", index % 64)),
                    index % 48 + 1,
                ))
        })
        .collect()
}

fn criterion_for_bench() -> VtapCriterion {
    VtapCriterion::new(
        "10.0.0.0/20".parse().expect("valid prefix"),
        "10.0.128.0/17".parse().expect("valid prefix"),
        IpProtocol::Tcp,
    )
}

fn bench_resolve(c: &mut Criterion) {
    let criterion = criterion_for_bench();
    let mut group = c.benchmark_group("membership_resolve");

    for count in [1_000u32, 10_000, 50_000] {
        let snapshot = hosts(count);
        group.throughput(Throughput::Elements(u64::from(count)));
        group.bench_with_input(BenchmarkId::from_parameter(count), &snapshot, |b, snapshot| {
            b.iter(|| resolve_in(black_box(snapshot), Facet::Tx, &criterion));
        });
    }
    group.finish();
}

fn bench_host_transition(c: &mut Criterion) {
    let criterion = criterion_for_bench();
    let snapshot = hosts(10_000);
    let current = resolve_in(&snapshot, Facet::Tx, &criterion);
    let departing = snapshot[0].clone();
    let arriving = HostRecord::new("vm-0")
        .with_ip("10.0.0.1".parse().expect("valid address"))
        .with_location(HostLocation::new(DeviceId::new("of:ffffffffffffffff"), 1));

    c.bench_function("host_transition_10k", |b| {
        b.iter(|| {
            apply_host_transition(
                black_box(&current),
                Facet::Tx,
                &criterion,
                Some(&departing),
                Some(&arriving),
                &snapshot,
            )
        });
    });
}

fn bench_delta(c: &mut Criterion) {
    let old: BTreeSet<DeviceId> = (0..512).map(|index| DeviceId::new(format!("of:{index}"))).collect();
    let new: BTreeSet<DeviceId> = (256..768).map(|index| DeviceId::new(format!("of:{index}"))).collect();

    c.bench_function("device_delta_512", |b| {
        b.iter(|| DeviceDelta::between(black_box(&old), black_box(&new)));
    });
}

criterion_group!(benches, bench_resolve, bench_host_transition, bench_delta);
criterion_main!(benches);
