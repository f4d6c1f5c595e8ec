//! Exercise every blocking collective of the in-process runtime.
//!
//! Each operation is verified with assertions and prints a PASS line from
//! the coordinator.
//!
//! Run with: cargo run --example collectives -- 4

use gridband::{Communicator, ReduceOp, Result, SpanDescriptor, World};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let size = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(4usize);
    assert!(size >= 2, "collectives demo requires at least 2 workers");

    World::new(size)?.run(exercise)?;
    println!("\nAll collective checks passed on {size} workers");
    Ok(())
}

fn exercise(world: Communicator) -> Result<()> {
    let rank = world.rank();
    let size = world.size();
    let pass = |name: &str| {
        if world.is_root() {
            println!("PASS: {name}");
        }
    };

    // ========================================================================
    // broadcast
    // ========================================================================
    {
        let mut data = vec![0.0f64; 10];
        if rank == 0 {
            for (i, x) in data.iter_mut().enumerate() {
                *x = (i + 1) as f64;
            }
        }
        world.broadcast(&mut data, 0)?;
        for (i, &x) in data.iter().enumerate() {
            assert!((x - (i + 1) as f64).abs() < f64::EPSILON);
        }
        pass("broadcast");
    }

    // ========================================================================
    // scatter
    // ========================================================================
    {
        let send: Vec<i32> = if rank == 0 {
            (0..(size * 3) as i32).collect()
        } else {
            Vec::new()
        };
        let mut recv = [0i32; 3];
        world.scatter(&send, &mut recv, 0)?;
        let base = (rank * 3) as i32;
        assert_eq!(recv, [base, base + 1, base + 2]);
        pass("scatter");
    }

    // ========================================================================
    // gather
    // ========================================================================
    {
        let send = [rank as u64 * 10, rank as u64 * 10 + 1];
        let mut recv = if rank == 0 { vec![0u64; 2 * size] } else { Vec::new() };
        world.gather(&send, &mut recv, 0)?;
        if rank == 0 {
            for r in 0..size as u64 {
                assert_eq!(recv[r as usize * 2], r * 10);
                assert_eq!(recv[r as usize * 2 + 1], r * 10 + 1);
            }
        }
        pass("gather");
    }

    // ========================================================================
    // gather_records
    // ========================================================================
    {
        let r = rank as i32;
        let span = SpanDescriptor {
            start: r,
            finish: r + 1,
            rank: r,
        };
        if let Some(spans) = world.gather_records(span, 0)? {
            for (i, s) in spans.iter().enumerate() {
                assert_eq!(s.rank, i as i32);
            }
        }
        pass("gather_records");
    }

    // ========================================================================
    // reduce / allreduce / allgather
    // ========================================================================
    {
        let sum = world.reduce_scalar(rank as i64 + 1, ReduceOp::Sum, 0)?;
        if let Some(sum) = sum {
            assert_eq!(sum, (size * (size + 1) / 2) as i64);
        }
        pass("reduce (Sum)");

        let max = world.allreduce_scalar(rank as u32, ReduceOp::Max)?;
        assert_eq!(max, size as u32 - 1);
        pass("allreduce (Max)");

        let mut all = vec![0.0f32; size];
        world.allgather(&[rank as f32], &mut all)?;
        for (i, &v) in all.iter().enumerate() {
            assert!((v - i as f32).abs() < f32::EPSILON);
        }
        pass("allgather");
    }

    world.barrier()?;
    pass("barrier");
    Ok(())
}
