use std::hint::black_box;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use worldspace_common::{EntityId, Location};
use worldspace_kernel::{AuthorityQueue, World};
use worldspace_relocate::{partition, RelocateConfig, RelocationService};

fn make_world(entity_count: usize) -> (World, Vec<EntityId>) {
    let mut world = World::new();
    let ids = (0..entity_count)
        .map(|i| world.spawn(Location::primary(i as f32, 64.0, 0.0)))
        .collect();
    (world, ids)
}

fn bench_partition(entity_count: usize, batch_size: usize, iterations: usize) {
    let ids: Vec<EntityId> = (0..entity_count).map(|_| EntityId::new()).collect();
    let size = NonZeroUsize::new(batch_size).expect("batch size must be positive");

    let start = Instant::now();
    for _ in 0..iterations {
        let _ = black_box(partition(black_box(&ids), size));
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!(
        "  partition ({entity_count} entities, n={batch_size}, {iterations} iters): {per_iter:?}/iter, total {elapsed:?}"
    );
}

fn bench_relocate(entity_count: usize, batch_size: usize, destinations: usize, iterations: usize) {
    let (mut world, ids) = make_world(entity_count);
    let mut queue = AuthorityQueue::<World>::new();
    let config = RelocateConfig::default().with_batch_size(batch_size);
    let service = RelocationService::start(config, queue.handle()).expect("service starts");
    let locations: Vec<Location> = (0..destinations)
        .map(|i| Location::primary(i as f32 * 48.0, 64.0, -(i as f32) * 48.0))
        .collect();

    let start = Instant::now();
    for _ in 0..iterations {
        let ticket = service
            .relocate_all(black_box(&ids), black_box(&locations))
            .expect("relocation accepted");
        queue.run_until(&mut world, Duration::from_secs(30), || ticket.is_done());
        world.drain_events();
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    let stats = queue.stats();
    println!(
        "  relocate ({entity_count} entities, n={batch_size}, {destinations} dests, {iterations} iters): {per_iter:?}/iter, {} authoritative tasks",
        stats.total()
    );

    service.shutdown();
    service.await_termination(Duration::from_secs(5));
}

fn main() {
    println!("=== Relocation Batch Benchmarks ===\n");

    println!("Partition:");
    bench_partition(1_000, 20, 10_000);
    bench_partition(10_000, 20, 1_000);
    bench_partition(10_000, 200, 1_000);

    println!("\nRelocate (end to end, batch size sweep):");
    bench_relocate(1_000, 5, 16, 20);
    bench_relocate(1_000, 20, 16, 20);
    bench_relocate(1_000, 100, 16, 20);
    bench_relocate(10_000, 20, 64, 5);

    println!("\n=== Done ===");
}
