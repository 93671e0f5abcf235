use crate::{
  config::Config,
  error::{ErrorKind, Result},
  schema::{Profile, Rol, User},
  store, util,
  web::{self, DB},
};
use actix_session::Session;
use error_chain::bail;
use hex_slice::AsHex;
use rusqlite::{named_params, params, OptionalExtension};
use sha2::{Digest, Sha256};

/// authenticated identity: the account plus its profile/role row
#[derive(Debug, Clone)]
pub struct Usuario {
  pub user: User,
  pub profile: Profile,
}

impl Usuario {
  pub fn rol(&self) -> Rol {
    self.profile.rol
  }

  pub fn es_admin(&self) -> bool {
    self.profile.rol == Rol::Admin
  }

  pub fn es_perito(&self) -> bool {
    matches!(self.profile.rol, Rol::Admin | Rol::Perito)
  }
}

/// capability check at the data-access boundary; UI conditionals only
/// decide what gets rendered, never what is allowed
pub fn require_rol(usuario: &Usuario, roles: &[Rol]) -> Result<()> {
  if !roles.contains(&usuario.rol()) {
    bail!(ErrorKind::Unauthorized);
  }
  Ok(())
}

pub fn password_hash(password: &str, config: &Config) -> String {
  format!(
    "{:02x}",
    Sha256::digest(format!("{}{}", password, config.web.secret_key).as_bytes())
      .as_slice()
      .plain_hex(false)
  )
}

pub fn gen_ssid() -> String {
  use rand::prelude::*;

  let mut data = [0u8; 32];
  rand::thread_rng().fill_bytes(&mut data);
  format!("{:02x}", data.plain_hex(false))
}

pub async fn check_session(ssid: String, db_pool: DB) -> Result<Option<Usuario>> {
  if ssid.len() != 64 {
    bail!(ErrorKind::InvalidRequest)
  }

  let res = web::block(db_pool, move |db| -> Result<Option<Usuario>> {
    // query session
    let session = match db
      .query_row(
        "select * from `sessions` where `id` = :ssid",
        params![ssid],
        |row| {
          Ok(crate::schema::Session {
            id: row.get(0)?,
            uid: row.get(1)?,
            expires: row.get::<_, i64>(2)? as u64,
          })
        },
      )
      .optional()?
    {
      Some(session) => session,
      None => return Ok(None),
    };

    // check for expired
    if session.expires < util::get_timestamp() {
      return Ok(None);
    }

    // query user + profile
    let user = db.query_row(
      "select * from `users` where `id` = :id",
      params![session.uid],
      |row| {
        Ok(User {
          id: row.get(0)?,
          login: row.get(1)?,
          password: row.get(2)?,
        })
      },
    )?;
    let profile = match store::profile_por_uid(&db, user.id)? {
      Some(profile) if profile.activo => profile,
      // banned accounts lose their session on the next request
      _ => return Ok(None),
    };

    Ok(Some(Usuario { user, profile }))
  })
  .await?;
  Ok(res)
}

pub async fn login(login: &str, password: &str, db_pool: DB, config: &Config, session: Session) -> Result<()> {
  // query user by login
  let user = web::block(db_pool.clone(), {
    let login = login.to_string();
    move |db| -> Result<_> {
      Ok(
        db.query_row(
          "select * from `users` where `login` = :login",
          params![login],
          |row| {
            Ok(User {
              id: row.get(0)?,
              login: row.get(1)?,
              password: row.get(2)?,
            })
          },
        )?,
      )
    }
  })
  .await
  .map_err(|_| ErrorKind::InvalidLogin)?;

  // check password hash
  if user.password != password_hash(password, config) {
    bail!(ErrorKind::InvalidLogin);
  }

  let timestamp = util::get_timestamp();

  // generate ssid
  let ssid = gen_ssid();
  let expires = timestamp + 2592000; // 1 month

  web::block(db_pool, {
    let ssid = ssid.clone();
    move |mut _db| -> Result<_> {
      // inactive accounts cannot open new sessions
      match store::profile_por_uid(&_db, user.id)? {
        Some(profile) if profile.activo => (),
        _ => bail!(ErrorKind::InvalidLogin),
      }

      let transaction = _db.transaction()?;

      // delete expired sessions
      transaction.execute(
        "delete from `sessions` where `uid` = :uid and `expires` < :timestamp",
        named_params![
          ":uid": user.id,
          ":timestamp": timestamp as i64
        ],
      )?;

      transaction.execute(
        "insert into sessions (`id`, `uid`, `expires`) values (:id, :uid, :expires)",
        named_params![
          ":id": ssid,
          ":uid": user.id,
          ":expires": expires as i64
        ],
      )?;

      transaction.commit()?;

      Ok(())
    }
  })
  .await?;

  // set session cookie
  session.insert("ssid", ssid).map_err(|_| "unable to set cookie")?;

  Ok(())
}

pub async fn logout(db_pool: DB, session: Session) -> Result<()> {
  let ssid = session
    .get::<String>("ssid")
    .ok()
    .flatten()
    .ok_or(ErrorKind::InvalidLogin)?;

  web::block(db_pool, move |db| -> Result<_> {
    db.execute("delete from `sessions` where `id` = :ssid", params![ssid])?;
    Ok(())
  })
  .await?;

  session.purge();
  Ok(())
}

pub async fn get_user(db_pool: DB, session: &Session) -> Result<Option<Usuario>> {
  // check session
  match session.get::<String>("ssid").ok().flatten() {
    Some(ssid) => check_session(ssid, db_pool).await,
    None => Ok(None),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn usuario(rol: Rol) -> Usuario {
    Usuario {
      user: User {
        id: 1,
        login: "x".into(),
        password: String::new(),
      },
      profile: Profile {
        uid: 1,
        full_name: "X".into(),
        phone: String::new(),
        rol,
        activo: true,
        created_at: 0,
        updated_at: 0,
      },
    }
  }

  #[test]
  fn require_rol_rechaza_roles_insuficientes() {
    assert!(require_rol(&usuario(Rol::Admin), &[Rol::Admin]).is_ok());
    assert!(require_rol(&usuario(Rol::Perito), &[Rol::Admin, Rol::Perito]).is_ok());
    assert!(require_rol(&usuario(Rol::User), &[Rol::Admin, Rol::Perito]).is_err());
  }

  #[test]
  fn perito_y_admin_son_peritos() {
    assert!(usuario(Rol::Admin).es_perito());
    assert!(usuario(Rol::Perito).es_perito());
    assert!(!usuario(Rol::User).es_perito());
    assert!(!usuario(Rol::Perito).es_admin());
  }
}
