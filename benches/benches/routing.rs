use std::{hint::black_box, sync::Arc, time::Duration};

use bytes::Bytes;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use zbroker::{
    CoreActor, CoreConfig, Element, Endpoint, Mailbox, MailboxConfig, SubscriptionTable, Topic,
};

const PAYLOAD: &[u8] = b"x";

/// Таблица, где на каждом уровне пути `l0/l1/...` сидит `subs` подписчиков.
fn layered_table(
    depth: usize,
    subs: usize,
) -> (SubscriptionTable, Vec<Arc<Mailbox>>, Topic) {
    let mut table = SubscriptionTable::new();
    let mailboxes: Vec<_> = (0..subs).map(|_| Mailbox::blocking()).collect();
    let mut topic = Topic::root();
    for level in 0..depth {
        topic = topic.join(format!("l{level}"));
        for mb in &mailboxes {
            table.subscribe(topic.clone(), mb.id(), &Arc::downgrade(mb));
        }
    }
    // Шум: топики, не совпадающие с публикацией.
    for i in 0..1000 {
        let mb = &mailboxes[i % subs.max(1)];
        table.subscribe(Topic::new(format!("noise/{i}")), mb.id(), &Arc::downgrade(mb));
    }
    (table, mailboxes, topic)
}

fn bench_route(c: &mut Criterion) {
    let mut group = c.benchmark_group("route");
    for depth in [1usize, 4, 8] {
        for subs in [1usize, 10, 100] {
            let (table, _mailboxes, topic) = layered_table(depth, subs);
            group.bench_with_input(
                BenchmarkId::new(format!("depth_{depth}"), subs),
                &topic,
                |b, topic| b.iter(|| black_box(table.route(black_box(topic)))),
            );
        }
    }
    group.finish();
}

fn bench_mailbox_handoff(c: &mut Criterion) {
    let mb = Mailbox::blocking();
    let element = Element::data("bench", Bytes::from_static(PAYLOAD));
    c.bench_function("mailbox_enqueue_dequeue", |b| {
        b.iter(|| {
            mb.enqueue(black_box(element.clone()));
            black_box(mb.try_dequeue())
        })
    });

    let pollable = Mailbox::new(&MailboxConfig { pollable: true }).unwrap();
    c.bench_function("pollable_mailbox_enqueue_dequeue", |b| {
        b.iter(|| {
            pollable.enqueue(black_box(element.clone()));
            black_box(pollable.try_dequeue())
        })
    });
}

fn bench_publish_receive(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish_receive");
    group.throughput(Throughput::Elements(1));
    for subs in [1usize, 10] {
        let core = CoreActor::spawn(&CoreConfig::default()).unwrap();
        let cfg = MailboxConfig { pollable: false };
        let endpoints: Vec<_> = (0..subs)
            .map(|_| {
                let ep = Endpoint::attach(&core.handle(), &cfg).unwrap();
                ep.subscribe("bench");
                ep
            })
            .collect();
        let publisher = core.handle();
        group.bench_function(BenchmarkId::from_parameter(subs), |b| {
            b.iter(|| {
                publisher.publish("bench/t", Element::data("bench/t", Bytes::from_static(PAYLOAD)));
                for ep in &endpoints {
                    black_box(ep.receive_timeout(Duration::from_secs(1)).ok());
                }
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_route,
    bench_mailbox_handoff,
    bench_publish_receive,
);
criterion_main!(benches);
