use std::convert::Infallible;
use std::fmt::Debug;
use std::net::SocketAddr;
use std::sync::Arc;

use env_logger::Env;
use log::info;
use tokio::sync::Mutex;
use uuid::Uuid;
use warp::{Filter, Rejection, Reply};

use crate::config::{Config, ConfigError};
use crate::error::{handle_rejection, ApiError};
use crate::handlers;
use crate::models::{
    CreateCommentBody, CreatePostBody, PageQuery, SearchQuery, Session, UpdateBioBody,
    UpdateOccupationBody, UpdatePostBody, UserId, VerificationBody,
};
use crate::store::PostStore;

/// Header the authentication layer uses to pass the signed-in user's id.
pub const SESSION_HEADER: &str = "x-user-id";

const MAX_BODY_BYTES: u64 = 16 * 1024;

/// A `Site` owns a `PostStore` and serves the Discuze API on top of it using the `start` methods.
pub trait Site<Store: PostStore + Send + Sync + 'static> {
    fn store(&self) -> Arc<Mutex<Store>>;
    /// Starts the API server.
    ///
    /// This method loads the config from a local .env file using `dotenv`. See `Config`
    ///
    /// - address: The address to bind the server to
    ///
    /// # Panics
    ///
    /// Panics if unable to bind to the provided address.
    fn start(
        &self,
        address: impl Into<SocketAddr> + Debug + Clone + Send,
    ) -> impl std::future::Future<Output = Result<(), ConfigError>> + Send {
        let store = self.store();
        async move {
            let config = Config::load_env_config()?;
            serve(store, config, address).await;
            Ok(())
        }
    }
    /// Starts the API server.
    ///
    /// - config: Configuration values, see `Config`
    /// - address: The address to bind the server to
    ///
    /// # Panics
    ///
    /// Panics if unable to bind to the provided address.
    fn start_with_config(
        &self,
        config: Config,
        address: impl Into<SocketAddr> + Debug + Clone + Send,
    ) -> impl std::future::Future<Output = ()> + Send {
        serve(self.store(), config, address)
    }
}

async fn serve<S: PostStore + Send + Sync + 'static>(
    store: Arc<Mutex<S>>,
    config: Config,
    address: impl Into<SocketAddr> + Debug + Clone + Send,
) {
    // A host binary may already have installed a logger.
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or("info")).try_init();

    info!("Serving discuze on {:?}", address);
    info!("Feed pages hold {} posts", config.page_size);

    let routes = routes(store, config).with(warp::log::custom(|info| {
        let method = info.method();
        let path = info.path();
        let status = info.status();
        let elapsed = info.elapsed().as_millis();

        if status.is_success() {
            info!(
                "Method: {}, Path: {}, Status: {}, Elapsed Time: {}ms",
                method, path, status, elapsed
            );
        } else {
            log::error!(
                "Method: {}, Path: {}, Status: {}, Elapsed Time: {}ms",
                method,
                path,
                status,
                elapsed,
            );
        }
    }));
    warp::serve(routes).run(address).await
}

/// Reads the session header. A malformed id is treated like a failed login.
pub fn session() -> impl Filter<Extract = (Option<Session>,), Error = Rejection> + Clone {
    warp::header::optional::<String>(SESSION_HEADER).and_then(|raw: Option<String>| async move {
        match raw {
            None => Ok(None),
            Some(raw) => Uuid::parse_str(raw.trim())
                .map(|id| {
                    Some(Session {
                        user_id: UserId(id),
                    })
                })
                .map_err(|_| warp::reject::custom(ApiError::Unauthorized)),
        }
    })
}

fn with_store<S: PostStore + Send + Sync + 'static>(
    store: Arc<Mutex<S>>,
) -> impl Filter<Extract = (Arc<Mutex<S>>,), Error = Infallible> + Clone {
    warp::any().map(move || store.clone())
}

fn with_config(
    config: Config,
) -> impl Filter<Extract = (Config,), Error = Infallible> + Clone {
    warp::any().map(move || config.clone())
}

fn json_body<T: serde::de::DeserializeOwned + Send>(
) -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

fn post_routes<S: PostStore + Send + Sync + 'static>(
    store: Arc<Mutex<S>>,
    config: Config,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let list = warp::path!("api" / "allposts")
        .and(warp::get())
        .and(warp::query::<PageQuery>())
        .and(with_store(store.clone()))
        .and(with_config(config))
        .and_then(handlers::list_posts::<S>);

    let single = warp::path!("api" / "allposts" / String)
        .and(warp::get())
        .and(with_store(store.clone()))
        .and_then(handlers::get_post::<S>);

    let comments = warp::path!("api" / "allposts" / String / "comments")
        .and(warp::get())
        .and(with_store(store.clone()))
        .and_then(handlers::post_comments::<S>);

    let create = warp::path!("api" / "create")
        .and(warp::post())
        .and(session())
        .and(json_body::<CreatePostBody>())
        .and(with_store(store.clone()))
        .and_then(handlers::create_post::<S>);

    let update = warp::path!("api" / "update" / String)
        .and(warp::put())
        .and(session())
        .and(json_body::<UpdatePostBody>())
        .and(with_store(store.clone()))
        .and_then(handlers::update_post::<S>);

    let delete = warp::path!("api" / "delete" / String)
        .and(warp::delete())
        .and(session())
        .and(with_store(store.clone()))
        .and_then(handlers::delete_post::<S>);

    let by_user = warp::path!("api" / "userposts" / String)
        .and(warp::get())
        .and(with_store(store))
        .and_then(handlers::user_posts::<S>);

    list.or(single)
        .or(comments)
        .or(create)
        .or(update)
        .or(delete)
        .or(by_user)
}

fn comment_routes<S: PostStore + Send + Sync + 'static>(
    store: Arc<Mutex<S>>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let create = warp::path!("api" / "comments")
        .and(warp::post())
        .and(session())
        .and(json_body::<CreateCommentBody>())
        .and(with_store(store.clone()))
        .and_then(handlers::create_comment::<S>);

    let delete = warp::path!("api" / "comments" / String)
        .and(warp::delete())
        .and(session())
        .and(with_store(store))
        .and_then(handlers::delete_comment::<S>);

    create.or(delete)
}

fn user_routes<S: PostStore + Send + Sync + 'static>(
    store: Arc<Mutex<S>>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let profile = warp::path!("api" / "userprofile" / String)
        .and(warp::get())
        .and(with_store(store.clone()))
        .and_then(handlers::user_profile::<S>);

    let search = warp::path!("api" / "searchusers")
        .and(warp::get())
        .and(warp::query::<SearchQuery>())
        .and(with_store(store.clone()))
        .and_then(handlers::search_users::<S>);

    let bio = warp::path!("api" / "updatebio")
        .and(warp::put())
        .and(session())
        .and(json_body::<UpdateBioBody>())
        .and(with_store(store.clone()))
        .and_then(handlers::update_bio::<S>);

    let occupation = warp::path!("api" / "updateoccupation")
        .and(warp::put())
        .and(session())
        .and(json_body::<UpdateOccupationBody>())
        .and(with_store(store.clone()))
        .and_then(handlers::update_occupation::<S>);

    let verify = warp::path!("api" / "getverified")
        .and(warp::post())
        .and(json_body::<VerificationBody>())
        .and(with_store(store))
        .and_then(handlers::get_verified::<S>);

    profile.or(search).or(bio).or(occupation).or(verify)
}

/// Every API route, with rejections turned into `{ success: false, message }` replies.
pub fn routes<S: PostStore + Send + Sync + 'static>(
    store: Arc<Mutex<S>>,
    config: Config,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    post_routes(store.clone(), config)
        .or(comment_routes(store.clone()))
        .or(user_routes(store))
        .recover(handle_rejection)
}
