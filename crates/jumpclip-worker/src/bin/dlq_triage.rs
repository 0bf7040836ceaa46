//! Inspect the dead-letter stream and optionally requeue what is safe to retry.
//!
//! Usage: `dlq-triage [--requeue] [--limit N]`
//!
//! A dead letter is a requeue candidate when its body parses and the job it
//! names is still `queued`. Anything else needs a human.

use anyhow::Context;
use jumpclip_models::{JobMessage, JobStatus};
use jumpclip_queue::{DeadLetter, DeadLetterSink, MessageQueue, RedisJobQueue};
use jumpclip_store::{FirestoreStore, JobStore};

#[derive(Debug, PartialEq, Eq)]
enum Verdict {
    RequeueCandidate,
    ManualReview(String),
}

async fn classify(letter: &DeadLetter, jobs: &dyn JobStore) -> anyhow::Result<Verdict> {
    let message = match JobMessage::parse(&letter.body) {
        Ok(message) => message,
        Err(e) => return Ok(Verdict::ManualReview(format!("unparsable body: {}", e))),
    };
    let verdict = match jobs.get(&message.job_id).await? {
        None => Verdict::ManualReview(format!("job {} not found", message.job_id)),
        Some(job) if job.status == JobStatus::Queued => Verdict::RequeueCandidate,
        Some(job) => Verdict::ManualReview(format!("job {} is {}", message.job_id, job.status)),
    };
    Ok(verdict)
}

struct Args {
    requeue: bool,
    limit: usize,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = Args {
        requeue: false,
        limit: 100,
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--requeue" => args.requeue = true,
            "--limit" => {
                args.limit = iter
                    .next()
                    .context("--limit needs a value")?
                    .parse()
                    .context("--limit must be a number")?;
            }
            other => anyhow::bail!("unknown argument {}", other),
        }
    }
    Ok(args)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;
    dotenvy::dotenv().ok();

    let args = parse_args()?;
    let queue = RedisJobQueue::from_env().context("Failed to create job queue")?;
    let jobs = FirestoreStore::from_env()
        .await
        .context("Failed to create Firestore store")?;

    let letters = queue.dead_letters(args.limit).await?;
    println!("dlq-triage: {} dead letter(s)", letters.len());

    let mut requeued = 0usize;
    for letter in &letters {
        let verdict = classify(letter, &jobs).await?;
        match &verdict {
            Verdict::RequeueCandidate => println!(
                "{}  requeue_candidate  receives={}  at={}",
                letter.id, letter.receive_count, letter.dead_lettered_at
            ),
            Verdict::ManualReview(reason) => println!(
                "{}  manual_review      receives={}  at={}  {}",
                letter.id, letter.receive_count, letter.dead_lettered_at, reason
            ),
        }

        if args.requeue && verdict == Verdict::RequeueCandidate {
            let id = queue.send(&letter.body).await?;
            queue.remove_dead_letter(&letter.id).await?;
            println!("{}  requeued as {}", letter.id, id);
            requeued += 1;
        }
    }

    if args.requeue {
        println!("dlq-triage: requeued {}", requeued);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use jumpclip_models::{Job, JobTarget, RenderOptions};
    use jumpclip_store::MemoryStore;

    fn letter(body: &str) -> DeadLetter {
        DeadLetter {
            id: "1-0".into(),
            body: body.into(),
            receive_count: 3,
            dead_lettered_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_classification() {
        let store = MemoryStore::new();
        let queued = Job::queued("u1", JobTarget::session("s1"), RenderOptions::default());
        store.put(&queued).await.unwrap();
        let running = Job::queued("u1", JobTarget::session("s2"), RenderOptions::default());
        store.put(&running).await.unwrap();
        store.claim(&running.job_id, Utc::now()).await.unwrap();

        let body = JobMessage::for_job(&queued).to_json().unwrap();
        assert_eq!(
            classify(&letter(&body), &store).await.unwrap(),
            Verdict::RequeueCandidate
        );

        let body = JobMessage::for_job(&running).to_json().unwrap();
        assert!(matches!(
            classify(&letter(&body), &store).await.unwrap(),
            Verdict::ManualReview(reason) if reason.contains("running")
        ));

        assert!(matches!(
            classify(&letter("{oops"), &store).await.unwrap(),
            Verdict::ManualReview(_)
        ));
    }
}
