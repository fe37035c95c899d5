use anyhow::Result;
use clap::Parser;
use discuze::{ApiClient, FeedPaginator, FetchOutcome};

#[derive(Parser, Debug)]
struct Args {
    /// Local URL/Port to use for requests
    /// Ex: http://0.0.0.0:3030
    #[arg(long)]
    local_url: String,

    /// Stop after this many pages
    #[arg(long, default_value_t = 20)]
    max_pages: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let client = ApiClient::new(args.local_url);
    let mut feed = FeedPaginator::new(client);

    while feed.has_more() && feed.pages_loaded() < args.max_pages {
        match feed.fetch_next_page().await? {
            FetchOutcome::Appended {
                page,
                received,
                appended,
            } => println!("Page {page}: {received} posts, {appended} new"),
            other => {
                println!("Stopped: {other:?}");
                break;
            }
        }
    }

    for post in feed.posts() {
        println!(
            "{} {} ({})\n  {}\n  {}",
            post.created_at.format("%Y-%m-%d %H:%M"),
            post.user.name,
            post.user.handle(),
            post.content,
            feed.fetcher().share_link(&post.id),
        );
    }

    println!(
        "Feed Summary: {} posts over {} pages, more available: {}",
        feed.posts().len(),
        feed.pages_loaded(),
        feed.has_more()
    );
    Ok(())
}
