use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use hdrhistogram::Histogram;
use rand::Rng;
use tally_limit::WindowLog;
use tokio::sync::Barrier;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tower::BoxError;
use tower::Layer;
use tower::Service;
use tower::ServiceExt;
use tower::service_fn;
use tower_tally::KeyedRateLimitLayer;
use tower_tally::ManagedKeyedRateLimitLayer;
use tower_tally::TallyError;

async fn mock_db_call(_req: String) -> Result<&'static str, tower::BoxError> {
    // Simulate real-world work (50ms of DB latency)
    sleep(Duration::from_millis(50)).await;
    Ok("success")
}

#[derive(Default)]
struct RejectionCounter {
    rate_limited: usize,
    timeouts: usize,
    sheds: usize,
    missing: usize,
    inner: usize,
    unknown: usize,
}

async fn run_load_test<S>(name: &str, svc: S, total_reqs: usize, clients: usize)
where
    S: Service<String, Response = &'static str, Error = tower::BoxError> + Clone + Send + 'static,
    S::Future: Send,
{
    let mut hist_elapsed = Histogram::<u64>::new_with_bounds(1, 60_000_000, 3).unwrap();
    let mut hist_ready = Histogram::<u64>::new_with_bounds(1, 60_000_000_000, 3).unwrap();

    let mut tasks = JoinSet::new();
    let mut rejections = RejectionCounter::default();

    let start = Instant::now();

    let barrier = Arc::new(Barrier::new(total_reqs));

    for _ in 0..total_reqs {
        let mut local_svc = svc.clone();
        let bar = barrier.clone();
        tasks.spawn(async move {
            let key = format!("client-{}", rand::rng().random_range(0..clients));
            bar.wait().await;
            let req_start = Instant::now();
            let ready_res = local_svc.ready().await;
            let ready = req_start.elapsed();

            if let Ok(ready_svc) = ready_res {
                let res = ready_svc.call(key).await;
                (res, ready, req_start.elapsed())
            } else {
                (ready_res.map(|_| ""), ready, req_start.elapsed())
            }
        });
    }

    let mut success_count = 0;

    while let Some(task) = tasks.join_next().await {
        let (res, ready, elapsed) = task.expect("Task panicked");
        match res {
            Ok(_) => {
                success_count += 1;
                hist_ready.record(ready.as_nanos() as u64).unwrap();
                hist_elapsed.record(elapsed.as_micros() as u64).unwrap();
            }
            Err(e) => {
                // Check if the error is one of our domain errors
                if let Some(tally_err) = e.downcast_ref::<TallyError>() {
                    match tally_err {
                        TallyError::RateLimited { .. } => rejections.rate_limited += 1,
                        TallyError::Timeout => rejections.timeouts += 1,
                        TallyError::Overloaded => rejections.sheds += 1,
                        TallyError::MissingKey => rejections.missing += 1,
                        TallyError::Inner(_) => rejections.inner += 1,
                    }
                } else if e.downcast_ref::<tower::timeout::error::Elapsed>().is_some() {
                    rejections.timeouts += 1;
                } else if e
                    .downcast_ref::<tower::load_shed::error::Overloaded>()
                    .is_some()
                {
                    rejections.sheds += 1;
                } else {
                    rejections.unknown += 1;
                }
            }
        }
    }

    let total_duration = start.elapsed();
    let throughput = total_reqs as f64 / total_duration.as_secs_f64();
    let goodput = success_count as f64 / total_duration.as_secs_f64();

    println!("--- {} ---", name);
    println!("Total Duration:  {:.2?}", total_duration);
    println!("Success/Total:   {}/{}", success_count, total_reqs);
    println!("Total Rate:      {:.2} req/sec", throughput);
    println!("Success Rate:    {:.2} req/sec (Goodput)", goodput);

    if success_count > 0 {
        println!("P50 (Elapsed):   {}µs", hist_elapsed.value_at_quantile(0.5));
        println!(
            "P99 (Elapsed):   {}µs",
            hist_elapsed.value_at_quantile(0.99)
        );
        println!("P50 (Ready):     {}ns", hist_ready.value_at_quantile(0.5));
        println!("P99 (Ready):     {}ns", hist_ready.value_at_quantile(0.99));
    }

    let total_errors = rejections.rate_limited
        + rejections.timeouts
        + rejections.sheds
        + rejections.missing
        + rejections.inner
        + rejections.unknown;
    println!("Errors:          {}", total_errors);
    if total_errors > 0 {
        println!("  └─ RateLimited: {}", rejections.rate_limited);
        println!("  └─ Timeouts:    {}", rejections.timeouts);
        println!("  └─ LoadSheds:   {}", rejections.sheds);
        if rejections.missing > 0 {
            println!("  └─ MissingKey:  {}", rejections.missing);
        }
        if rejections.inner > 0 {
            println!("  └─ Inner:       {}", rejections.inner);
        }
        if rejections.unknown > 0 {
            println!("  └─ Unknown:     {}", rejections.unknown);
        }
    }
    println!();
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let capacity = 100.try_into()?;
    let window = Duration::from_secs(1);
    let timeout = Duration::from_millis(75);
    let total_reqs = 5_000;
    let clients = 64;

    let key = |req: &String| Some(req.clone());

    // 1.a. Managed keyed stress
    let limiter = Arc::new(WindowLog::new(capacity, window));
    let managed_svc =
        ManagedKeyedRateLimitLayer::new(limiter, key, timeout).layer(service_fn(mock_db_call));
    run_load_test("Managed WindowLog", managed_svc, total_reqs, clients).await;

    // 1.b. Raw keyed stress
    let limiter = Arc::new(WindowLog::new(capacity, window));
    let raw_svc = KeyedRateLimitLayer::new(limiter, key).layer(service_fn(mock_db_call));
    run_load_test("Raw WindowLog", raw_svc, total_reqs, clients).await;

    // 2. Tower's built-in global limiter as a baseline. Note that the budget
    //    here is process-wide: one greedy client can consume all of it.
    let tower_svc = tower::ServiceBuilder::new()
        .buffer(1_000)
        .rate_limit((capacity.get() * clients) as u64, window)
        .service(service_fn(mock_db_call));
    run_load_test("Global Tower RateLimit", tower_svc, total_reqs, clients).await;

    Ok(())
}
