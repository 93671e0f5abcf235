use crate::{config, email, error, informe, mercadopago, store, util};
use actix_session::{storage::CookieSessionStore, Session, SessionMiddleware};
use actix_web::{get, middleware, post, web, App, HttpResponse, HttpServer};
use error_chain::bail;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use serde_json::Value as JsonValue;

mod api;
pub mod auth;
mod mvc;

pub type DB = web::Data<Pool<SqliteConnectionManager>>;
pub type Config = web::Data<config::Config>;
pub type MercadoPago = web::Data<mercadopago::Client>;
pub type Mailer = web::Data<email::Mailer>;

/*
 * wrapper over actix_web::web::block
 * receive smart pointer on db pool, spawn task, and obtain connection, before passing to the inner closure
 */
pub async fn block<F, I>(db_pool: DB, f: F) -> error::Result<I>
where
  F: FnOnce(PooledConnection<SqliteConnectionManager>) -> error::Result<I> + Send + 'static,
  I: Send + 'static,
{
  web::block(move || f(db_pool.get()?)).await?
}

#[get("/views/{uri:.+}")]
async fn sv_views(
  uri: web::Path<String>,
  db_pool: DB,
  config: Config,
  session: Session,
) -> Result<HttpResponse, error::Error> {
  let t0 = std::time::Instant::now();
  let uri = util::strip_slashes(uri.to_string());

  let user = auth::get_user(db_pool.clone(), &session).await?;
  if user.is_none() && (uri != "/login") && (uri != "/registro") {
    return Ok(util::redirect("views/login", &config));
  };
  if user.is_some() && (uri == "/login" || uri == "/registro") {
    return Ok(util::redirect("views/home", &config));
  };

  let res = mvc::model(uri, db_pool, config, user).await.map(|res| {
    HttpResponse::Ok()
      .content_type("text/html; charset=utf-8")
      .body(res.into_string())
  })?;

  log::debug!("profiling: {:?}", std::time::Instant::now().duration_since(t0));
  Ok(res)
}

#[post("/rpc/{uri:.+}")]
async fn sv_rpc(
  uri: web::Path<String>,
  payload: web::Bytes,
  db_pool: DB,
  config: Config,
  mercadopago: MercadoPago,
  mailer: Mailer,
  session: Session,
) -> Result<HttpResponse, error::Error> {
  let t0 = std::time::Instant::now();
  let uri = util::strip_slashes(uri.to_string());

  let user = auth::get_user(db_pool.clone(), &session).await?;
  if user.is_none() && (uri != "/auth/login") && (uri != "/auth/registro") {
    return Ok(HttpResponse::Unauthorized().finish());
  };

  // parse into untyped
  let post_data = serde_json::from_slice::<JsonValue>(payload.as_ref())?;

  // the controller already serialized its response
  let res = mvc::controller(uri, post_data, db_pool, config, mercadopago, mailer, user, session)
    .await
    .map(|res| {
      HttpResponse::Ok()
        .content_type("application/json")
        .body(res)
    });

  log::debug!("profiling: {:?}", std::time::Instant::now().duration_since(t0));
  res
}

/// public surface for the payment webhook and the email actions; no
/// session, no cors hash
#[post("/api/{uri:.+}")]
async fn sv_api(
  uri: web::Path<String>,
  payload: web::Bytes,
  db_pool: DB,
  mercadopago: MercadoPago,
  mailer: Mailer,
) -> Result<HttpResponse, error::Error> {
  let uri = util::strip_slashes(uri.to_string());

  // the webhook sender retries on non-2xx, so a malformed body is handed
  // to the route as null instead of failing here
  let post_data = serde_json::from_slice::<JsonValue>(payload.as_ref()).unwrap_or(JsonValue::Null);

  api::main(uri, post_data, db_pool, mercadopago, mailer).await
}

#[get("/pdf/{id}")]
async fn sv_pdf(id: web::Path<String>, db_pool: DB, session: Session) -> Result<HttpResponse, error::Error> {
  let user = auth::get_user(db_pool.clone(), &session).await?;
  if user.is_none() {
    return Ok(HttpResponse::Unauthorized().finish());
  };

  let id = id.into_inner();
  let peritaje = block(db_pool, move |db| {
    store::peritaje_por_id(&db, &id)?.ok_or_else(|| error::ErrorKind::RouteNotFound.into())
  })
  .await?;

  let filename = format!(
    "Peritaje_{}.pdf",
    peritaje.id.get(..8).unwrap_or(&peritaje.id).to_uppercase()
  );
  let pdf = informe::generar_pdf(&peritaje)?;

  Ok(
    HttpResponse::Ok()
      .content_type("application/pdf")
      .append_header((
        "content-disposition",
        format!("attachment; filename=\"{}\"", filename),
      ))
      .body(pdf),
  )
}

#[actix_web::main]
pub async fn init(config: config::Config, db_pool: Pool<SqliteConnectionManager>) -> error::Result<()> {
  let mercadopago = mercadopago::Client::new(config.mercadopago.clone());
  let mailer = email::Mailer::new(config.email.clone());

  let server = HttpServer::new({
    let config = config.clone();
    move || {
      App::new()
        .app_data(web::Data::new(db_pool.to_owned()))
        .app_data(web::Data::new(config.to_owned()))
        .app_data(web::Data::new(mercadopago.to_owned()))
        .app_data(web::Data::new(mailer.to_owned()))
        .wrap(middleware::Logger::default())
        .wrap(
          SessionMiddleware::builder(CookieSessionStore::default(), util::cookie_key(&config))
            .cookie_secure(false)
            .build(),
        )
        .service(sv_views)
        .service(sv_rpc)
        .service(sv_api)
        .service(sv_pdf)
        .service(actix_files::Files::new("/static", "./data/static"))
        .default_service(web::to(|req: actix_web::HttpRequest| async move {
          // 404 for GET request
          if req.method() == actix_web::http::Method::GET {
            HttpResponse::NotFound()
          // all requests that are not `GET`
          } else {
            HttpResponse::MethodNotAllowed()
          }
        }))
    }
  });
  if config.server.bind_addr.starts_with("unix:/") {
    #[cfg(target_os = "linux")]
    {
      server
        .bind_uds(config.server.bind_addr.strip_prefix("unix:").ok_or("invalid bind_addr")?)?
        .run()
        .await?;
    }
    #[cfg(not(target_os = "linux"))]
    bail!("Unix sockets are not available for this target");
  } else {
    server.bind(config.server.bind_addr)?.run().await?;
  }
  Ok(())
}
