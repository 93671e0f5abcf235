use crate::{error::Result, schema::Rol, store, web::auth};
use clap::{Arg, ArgAction, Command};
use std::process::exit;

pub fn load(config: &crate::config::Config, db: &r2d2::Pool<r2d2_sqlite::SqliteConnectionManager>) -> Result<()> {
  let matches = Command::new("perimec")
    .subcommand(Command::new("init").about("create the database schema"))
    .subcommand(
      Command::new("register")
        .about("register a new staff user")
        .arg(Arg::new("user").short('u').long("user").required(true))
        .arg(Arg::new("password").short('p').long("password").required(true))
        .arg(Arg::new("name").short('n').long("name"))
        .arg(Arg::new("phone").long("phone"))
        .arg(
          Arg::new("rol")
            .short('r')
            .long("rol")
            .value_parser(["admin", "perito", "user"])
            .default_value("user"),
        )
        .arg(Arg::new("inactivo").long("inactivo").action(ArgAction::SetTrue)),
    )
    .get_matches();

  let db = db.get()?;

  match matches.subcommand() {
    /*** init ***/
    Some(("init", _)) => {
      store::init_schema(&db)?;
      println!("database schema created");
      exit(0);
    }

    /*** register ***/
    Some(("register", command)) => {
      let login = command.get_one::<String>("user").cloned().unwrap_or_default();
      let password = command.get_one::<String>("password").cloned().unwrap_or_default();

      let uid = store::insert_usuario(
        &db,
        &store::NuevoUsuario {
          login: login.clone(),
          password: auth::password_hash(&password, config),
          full_name: command.get_one::<String>("name").cloned().unwrap_or(login),
          phone: command.get_one::<String>("phone").cloned().unwrap_or_default(),
          rol: command
            .get_one::<String>("rol")
            .map(String::as_str)
            .unwrap_or("user")
            .parse::<Rol>()
            .map_err(|_| "invalid rol")?,
        },
      )?;
      if command.get_flag("inactivo") {
        store::actualizar_activo(&db, uid, false)?;
      }

      println!("user registered, uid = {}", uid);
      exit(0);
    }

    _ => (),
  };
  Ok(())
}
